// Test Helpers Module - shared fixtures for unit tests inside the crate.
//
// Integration tests under tests/ have their own harness in tests/common.

use crate::models::{Address, DeliveryRecord, OrderDetail, OrderItem};
use chrono::Utc;

pub fn sample_detail(order_id: &str, restaurant_id: &str) -> OrderDetail {
    OrderDetail {
        order_id: order_id.to_string(),
        restaurant_id: restaurant_id.to_string(),
        customer_id: "CUST-1".to_string(),
        items: vec![OrderItem {
            product_id: "PROD-1".to_string(),
            name: "Lomo saltado".to_string(),
            quantity: 2,
            price: 18.5,
        }],
        delivery_address: Address {
            street: "Jr. de la Union 450".to_string(),
            city: "Lima".to_string(),
            postal_code: "15001".to_string(),
            coordinates: None,
        },
        total_amount: 37.0,
        created_at: Utc::now(),
    }
}

pub fn sample_record(order_id: &str, restaurant_id: &str) -> DeliveryRecord {
    DeliveryRecord::new(sample_detail(order_id, restaurant_id), Utc::now())
}
