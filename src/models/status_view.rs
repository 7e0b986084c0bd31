use super::delivery_record::{AssignedActor, DeliveryRecord, StatusHistoryEntry};
use crate::state_machine::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read model returned by the status query surface.
///
/// Built from a [`DeliveryRecord`] but never carries the callback token: only whether a
/// confirmation is outstanding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatusView {
    pub order_id: String,
    pub status: OrderStatus,
    pub restaurant_id: String,
    pub cook: Option<AssignedActor>,
    pub dispatcher: Option<AssignedActor>,
    pub courier: Option<AssignedActor>,
    pub status_history: Vec<StatusHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub confirmation_code: Option<String>,
    pub awaiting_confirmation: bool,
}

impl From<&DeliveryRecord> for DeliveryStatusView {
    fn from(record: &DeliveryRecord) -> Self {
        Self {
            order_id: record.order_id.clone(),
            status: record.status,
            restaurant_id: record.restaurant_id().to_string(),
            cook: record.cook.clone(),
            dispatcher: record.dispatcher.clone(),
            courier: record.courier.clone(),
            status_history: record.status_history.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            delivered_at: record.delivered_at,
            confirmation_code: record.confirmation_code.clone(),
            awaiting_confirmation: record.awaiting_confirmation,
        }
    }
}
