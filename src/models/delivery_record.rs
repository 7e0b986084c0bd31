use super::order_detail::OrderDetail;
use crate::callbacks::AwaitedStep;
use crate::constants::indexes;
use crate::state_machine::{OrderStatus, Role};
use crate::store::StoredRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// DeliveryRecord tracks one order from payment to hand-off.
/// Keyed by `order_id`; every mutation goes through a conditional store write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub order_id: String,
    pub status: OrderStatus,
    pub order_detail: OrderDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook: Option<AssignedActor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatcher: Option<AssignedActor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier: Option<AssignedActor>,
    pub status_history: Vec<StatusHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_callback: Option<PendingCallback>,
    #[serde(default)]
    pub awaiting_confirmation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

/// One entry per status transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

/// Identity of a person the resolver picked for a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
}

impl ActorProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            vehicle: None,
            estimated_minutes: None,
        }
    }

    /// Courier profile with vehicle and estimated delivery minutes.
    pub fn courier(
        id: impl Into<String>,
        name: impl Into<String>,
        vehicle: impl Into<String>,
        estimated_minutes: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            vehicle: Some(vehicle.into()),
            estimated_minutes: Some(estimated_minutes),
        }
    }
}

/// An actor bound to an assignment slot. Never replaced once set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedActor {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    pub assigned_at: DateTime<Utc>,
}

impl AssignedActor {
    pub fn from_profile(profile: ActorProfile, assigned_at: DateTime<Utc>) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            vehicle: profile.vehicle,
            estimated_minutes: profile.estimated_minutes,
            assigned_at,
        }
    }
}

/// Outstanding external confirmation handed to us by the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCallback {
    pub token: String,
    pub step: AwaitedStep,
    pub registered_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Fresh record in `RECIBIDO` with a single history entry.
    pub fn new(order_detail: OrderDetail, now: DateTime<Utc>) -> Self {
        Self {
            order_id: order_detail.order_id.clone(),
            status: OrderStatus::Received,
            order_detail,
            cook: None,
            dispatcher: None,
            courier: None,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Received,
                timestamp: now,
                actor: None,
            }],
            pending_callback: None,
            awaiting_confirmation: false,
            created_at: now,
            updated_at: now,
            delivered_at: None,
            confirmation_code: None,
            customer_signature: None,
            delivery_notes: None,
            cancellation_reason: None,
        }
    }

    pub fn restaurant_id(&self) -> &str {
        &self.order_detail.restaurant_id
    }

    pub fn slot(&self, role: Role) -> Option<&AssignedActor> {
        match role {
            Role::Cook => self.cook.as_ref(),
            Role::Dispatcher => self.dispatcher.as_ref(),
            Role::Courier => self.courier.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, role: Role) -> &mut Option<AssignedActor> {
        match role {
            Role::Cook => &mut self.cook,
            Role::Dispatcher => &mut self.dispatcher,
            Role::Courier => &mut self.courier,
        }
    }

    pub fn last_history_timestamp(&self) -> Option<DateTime<Utc>> {
        self.status_history.last().map(|entry| entry.timestamp)
    }

    /// Whole minutes between record creation and `now`, rounded to nearest.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> i64 {
        let elapsed_ms = (now - self.created_at).num_milliseconds().max(0);
        (elapsed_ms + 30_000) / 60_000
    }

    /// History is non-empty, time-ordered, ends at `status`, and token/flag agree.
    pub fn is_consistent(&self) -> bool {
        let ordered = self
            .status_history
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp);
        let ends_at_status = self
            .status_history
            .last()
            .is_some_and(|entry| entry.status == self.status);
        ordered && ends_at_status && self.pending_callback.is_some() == self.awaiting_confirmation
    }
}

impl StoredRecord for DeliveryRecord {
    fn key(&self) -> &str {
        &self.order_id
    }

    fn index_value(&self, index_name: &str) -> Option<String> {
        match index_name {
            indexes::RESTAURANT_ID => Some(self.order_detail.restaurant_id.clone()),
            indexes::STATUS => Some(self.status.to_string()),
            _ => None,
        }
    }
}
