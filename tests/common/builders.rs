//! Test data builders for orders and inbound events.

#![allow(dead_code)]

use chrono::Utc;
use delivery_orchestrator::events::{ComidaPreparada, Despachado, Entregado, PagoConfirmado};
use delivery_orchestrator::models::{Address, OrderDetail, OrderItem};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Unique id for test isolation
pub fn unique_id(prefix: &str) -> String {
    format!("{prefix}-{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Builder for order details and the payment event that carries them
pub struct OrderBuilder {
    order_id: String,
    restaurant_id: String,
    customer_id: String,
    items: Vec<OrderItem>,
}

impl OrderBuilder {
    pub fn new() -> Self {
        Self {
            order_id: unique_id("ORD"),
            restaurant_id: "R1".to_string(),
            customer_id: "CUST-1".to_string(),
            items: vec![OrderItem {
                product_id: "PROD-1".to_string(),
                name: "Aji de gallina".to_string(),
                quantity: 1,
                price: 24.0,
            }],
        }
    }

    pub fn with_order_id(mut self, order_id: &str) -> Self {
        self.order_id = order_id.to_string();
        self
    }

    pub fn with_restaurant(mut self, restaurant_id: &str) -> Self {
        self.restaurant_id = restaurant_id.to_string();
        self
    }

    pub fn without_items(mut self) -> Self {
        self.items.clear();
        self
    }

    fn address() -> Address {
        Address {
            street: "Av. Arequipa 1200".to_string(),
            city: "Lima".to_string(),
            postal_code: "15046".to_string(),
            coordinates: None,
        }
    }

    fn total(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum()
    }

    pub fn detail(self) -> OrderDetail {
        OrderDetail {
            total_amount: self.total(),
            order_id: self.order_id,
            restaurant_id: self.restaurant_id,
            customer_id: self.customer_id,
            items: self.items,
            delivery_address: Self::address(),
            created_at: Utc::now(),
        }
    }

    pub fn payment(self) -> PagoConfirmado {
        PagoConfirmado {
            total_amount: self.total(),
            order_id: self.order_id,
            restaurant_id: self.restaurant_id,
            customer_id: self.customer_id,
            items: self.items,
            delivery_address: Self::address(),
            payment_id: unique_id("PAY"),
            timestamp: Utc::now(),
        }
    }

    /// `PagoConfirmado` detail as it arrives from the bus
    pub fn payment_json(self) -> Value {
        serde_json::to_value(self.payment()).unwrap_or_else(|_| json!({}))
    }
}

impl Default for OrderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn food_ready(order_id: &str, token: &str) -> ComidaPreparada {
    ComidaPreparada {
        order_id: order_id.to_string(),
        cocinero_id: "COC-001".to_string(),
        task_token: token.to_string(),
        timestamp: Utc::now(),
    }
}

pub fn dispatched(order_id: &str, token: &str) -> Despachado {
    Despachado {
        order_id: order_id.to_string(),
        despachador_id: "DES-001".to_string(),
        task_token: token.to_string(),
        timestamp: Utc::now(),
    }
}

pub fn delivered(order_id: &str, token: &str, code: &str) -> Entregado {
    Entregado {
        order_id: order_id.to_string(),
        repartidor_id: "REP-001".to_string(),
        task_token: token.to_string(),
        confirmation_code: code.to_string(),
        timestamp: Utc::now(),
    }
}
