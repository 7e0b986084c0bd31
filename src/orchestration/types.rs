//! # Orchestration Types
//!
//! Triggers that drive an order through its lifecycle, and what handling one yields.

use crate::callbacks::AwaitedStep;
use crate::error::{DeliveryError, DeliveryResult};
use crate::events::{ComidaPreparada, Despachado, Entregado, ErrorKind, InboundEvent, PagoConfirmado};
use crate::models::DeliveryRecord;
use crate::notifications::BroadcastSummary;
use crate::state_machine::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five ways an order can be pushed forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    PaymentConfirmed,
    FoodReady,
    Dispatched,
    DeliveryConfirmedExternally,
    DeliveryConfirmedViaDirectRequest,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentConfirmed => "payment_confirmed",
            Self::FoodReady => "food_ready",
            Self::Dispatched => "dispatched",
            Self::DeliveryConfirmedExternally => "delivery_confirmed_externally",
            Self::DeliveryConfirmedViaDirectRequest => "delivery_confirmed_via_direct_request",
        }
    }

    /// Error tag published when this trigger fails for a reason of its own.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::PaymentConfirmed => ErrorKind::AsignacionCocineroFallida,
            Self::FoodReady => ErrorKind::AsignacionDespachadorFallida,
            Self::Dispatched => ErrorKind::AsignacionRepartidorFallida,
            Self::DeliveryConfirmedExternally | Self::DeliveryConfirmedViaDirectRequest => {
                ErrorKind::ErrorConfirmacionEntrega
            }
        }
    }

    /// Callback consumed by this trigger
    pub fn awaited_step(&self) -> Option<AwaitedStep> {
        match self {
            Self::PaymentConfirmed => None,
            Self::FoodReady => Some(AwaitedStep::FoodPreparation),
            Self::Dispatched => Some(AwaitedStep::Dispatch),
            Self::DeliveryConfirmedExternally | Self::DeliveryConfirmedViaDirectRequest => {
                Some(AwaitedStep::DeliveryConfirmation)
            }
        }
    }

    /// Role staffed while handling this trigger
    pub fn assigned_role(&self) -> Option<Role> {
        match self {
            Self::PaymentConfirmed => Some(Role::Cook),
            Self::FoodReady => Some(Role::Dispatcher),
            Self::Dispatched => Some(Role::Courier),
            Self::DeliveryConfirmedExternally | Self::DeliveryConfirmedViaDirectRequest => None,
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body of a direct delivery confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    pub confirmation_code: String,
    #[serde(default)]
    pub customer_signature: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ConfirmationRequest {
    pub fn new(confirmation_code: impl Into<String>) -> Self {
        Self {
            confirmation_code: confirmation_code.into(),
            customer_signature: None,
            notes: None,
        }
    }

    pub fn validate(&self) -> DeliveryResult<()> {
        if self.confirmation_code.trim().is_empty() {
            return Err(DeliveryError::InvalidEvent(
                "confirmationCode is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectConfirmation {
    pub order_id: String,
    #[serde(flatten)]
    pub request: ConfirmationRequest,
}

/// What a successful direct confirmation returns to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationReceipt {
    pub order_id: String,
    pub confirmation_code: String,
    pub total_delivery_time_minutes: i64,
    pub delivered_at: DateTime<Utc>,
}

impl ConfirmationReceipt {
    pub fn from_record(record: &DeliveryRecord) -> DeliveryResult<Self> {
        let delivered_at = record.delivered_at.ok_or_else(|| DeliveryError::InvalidTransition {
            order_id: record.order_id.clone(),
            from: record.status,
            to: crate::state_machine::OrderStatus::Delivered,
        })?;
        Ok(Self {
            order_id: record.order_id.clone(),
            confirmation_code: record.confirmation_code.clone().unwrap_or_default(),
            total_delivery_time_minutes: record.elapsed_minutes(delivered_at),
            delivered_at,
        })
    }
}

/// A lifecycle trigger with its typed payload
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    PaymentConfirmed(PagoConfirmado),
    FoodReady(ComidaPreparada),
    Dispatched(Despachado),
    DeliveryConfirmedExternally(Entregado),
    DeliveryConfirmedViaDirectRequest(DirectConfirmation),
}

impl Trigger {
    pub fn direct_confirmation(order_id: impl Into<String>, request: ConfirmationRequest) -> Self {
        Self::DeliveryConfirmedViaDirectRequest(DirectConfirmation {
            order_id: order_id.into(),
            request,
        })
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::PaymentConfirmed(_) => TriggerKind::PaymentConfirmed,
            Self::FoodReady(_) => TriggerKind::FoodReady,
            Self::Dispatched(_) => TriggerKind::Dispatched,
            Self::DeliveryConfirmedExternally(_) => TriggerKind::DeliveryConfirmedExternally,
            Self::DeliveryConfirmedViaDirectRequest(_) => {
                TriggerKind::DeliveryConfirmedViaDirectRequest
            }
        }
    }

    /// Shape check applied before any state is touched
    pub fn validate(&self) -> DeliveryResult<()> {
        match self {
            Self::PaymentConfirmed(p) => InboundEvent::PagoConfirmado(p.clone()).validate(),
            Self::FoodReady(p) => InboundEvent::ComidaPreparada(p.clone()).validate(),
            Self::Dispatched(p) => InboundEvent::Despachado(p.clone()).validate(),
            Self::DeliveryConfirmedExternally(p) => InboundEvent::Entregado(p.clone()).validate(),
            Self::DeliveryConfirmedViaDirectRequest(p) => {
                if p.order_id.trim().is_empty() {
                    return Err(DeliveryError::InvalidEvent("orderId is required".to_string()));
                }
                p.request.validate()
            }
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            Self::PaymentConfirmed(p) => &p.order_id,
            Self::FoodReady(p) => &p.order_id,
            Self::Dispatched(p) => &p.order_id,
            Self::DeliveryConfirmedExternally(p) => &p.order_id,
            Self::DeliveryConfirmedViaDirectRequest(p) => &p.order_id,
        }
    }
}

impl From<InboundEvent> for Trigger {
    fn from(event: InboundEvent) -> Self {
        match event {
            InboundEvent::PagoConfirmado(p) => Self::PaymentConfirmed(p),
            InboundEvent::ComidaPreparada(p) => Self::FoodReady(p),
            InboundEvent::Despachado(p) => Self::Dispatched(p),
            InboundEvent::Entregado(p) => Self::DeliveryConfirmedExternally(p),
        }
    }
}

/// Result of a handled trigger
#[derive(Debug, Clone)]
pub struct TriggerOutcome {
    pub kind: TriggerKind,
    pub record: DeliveryRecord,
    /// `None` when the status push could not reach the subscriber index
    pub broadcast: Option<BroadcastSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_event_maps_to_trigger() {
        let event = InboundEvent::parse(
            "Despachado",
            json!({"orderId": "O1", "despachadorId": "DES-001", "taskToken": "tok"}),
        )
        .unwrap();
        let trigger = Trigger::from(event);
        assert_eq!(trigger.kind(), TriggerKind::Dispatched);
        assert_eq!(trigger.order_id(), "O1");
        assert_eq!(trigger.kind().assigned_role(), Some(Role::Courier));
        assert_eq!(trigger.kind().awaited_step(), Some(AwaitedStep::Dispatch));
    }

    #[test]
    fn test_error_kind_per_trigger() {
        assert_eq!(
            TriggerKind::PaymentConfirmed.error_kind(),
            ErrorKind::AsignacionCocineroFallida
        );
        assert_eq!(
            TriggerKind::DeliveryConfirmedViaDirectRequest.error_kind(),
            ErrorKind::ErrorConfirmacionEntrega
        );
    }

    #[test]
    fn test_confirmation_request_wire_shape() {
        let request: ConfirmationRequest =
            serde_json::from_value(json!({"confirmationCode": "ABC", "notes": "porton"})).unwrap();
        assert_eq!(request.customer_signature, None);
        request.validate().unwrap();
        assert!(ConfirmationRequest::new("  ").validate().is_err());
    }
}
