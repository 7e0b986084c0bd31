//! Error types for the delivery orchestration core.
//!

use crate::callbacks::AwaitedStep;
use crate::config::ConfigurationError;
use crate::events::ErrorKind;
use crate::orchestration::TriggerKind;
use crate::state_machine::{OrderStatus, Role};
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeliveryError {
    #[error("Order {order_id} not found")]
    NotFound { order_id: String },
    #[error("Order {order_id} already exists")]
    AlreadyExists { order_id: String },
    #[error("Invalid transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    #[error("Order {order_id} already has a {role} assigned")]
    AlreadyAssigned { order_id: String, role: Role },
    #[error("Order {order_id} was already delivered")]
    AlreadyDelivered { order_id: String },
    #[error("Order {order_id} already has a pending {step} token")]
    DuplicatePending { order_id: String, step: AwaitedStep },
    #[error("Order {order_id} has no pending confirmation{}", .step.map(|s| format!(" for {s}")).unwrap_or_default())]
    NoPendingToken {
        order_id: String,
        step: Option<AwaitedStep>,
    },
    #[error("No {role} available for restaurant {restaurant_id}")]
    AssignmentUnavailable { role: Role, restaurant_id: String },
    #[error("Concurrent modification of order {order_id} after {attempts} attempt(s)")]
    ConcurrentModification { order_id: String, attempts: u32 },
    #[error("Timed out after {timeout_ms}ms: {operation}")]
    TimeoutExpired { operation: String, timeout_ms: u64 },
    #[error("Subscriber {connection_id} is gone")]
    TransportGone { connection_id: String },
    #[error("Send to subscriber {connection_id} failed: {reason}")]
    TransportFailed { connection_id: String, reason: String },
    #[error("Workflow signal for order {order_id} failed: {reason}")]
    SignalFailed { order_id: String, reason: String },
    #[error("Event publishing failed: {0}")]
    EventPublish(String),
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DeliveryError {
    /// Only lost optimistic-concurrency races are worth an automatic retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }

    /// Stable machine-readable name, used as the `error` field in logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::AlreadyAssigned { .. } => "already_assigned",
            Self::AlreadyDelivered { .. } => "already_delivered",
            Self::DuplicatePending { .. } => "duplicate_pending",
            Self::NoPendingToken { .. } => "no_pending_token",
            Self::AssignmentUnavailable { .. } => "assignment_unavailable",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::TimeoutExpired { .. } => "timeout_expired",
            Self::TransportGone { .. } => "transport_gone",
            Self::TransportFailed { .. } => "transport_failed",
            Self::SignalFailed { .. } => "signal_failed",
            Self::EventPublish(_) => "event_publish",
            Self::InvalidEvent(_) => "invalid_event",
            Self::Store(_) => "store",
            Self::Configuration(_) => "configuration",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Outbound error tag for this failure while handling `trigger`.
    ///
    /// Anything not tied to a timeout or a missing actor takes the trigger's own tag, so
    /// a store failure during `PagoConfirmado` reads as `ASIGNACION_COCINERO_FALLIDA`.
    /// The orchestrator does not publish `AlreadyExists` for a repeated payment at all.
    pub fn error_kind(&self, trigger: TriggerKind) -> ErrorKind {
        match self {
            Self::TimeoutExpired { .. } => ErrorKind::TimeoutEntrega,
            Self::AssignmentUnavailable { role, .. } => ErrorKind::for_assignment(*role),
            _ => trigger.error_kind(),
        }
    }

    /// Maps a store failure on a delivery record into the crate taxonomy.
    pub fn from_store(order_id: &str, err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists { .. } => Self::AlreadyExists {
                order_id: order_id.to_string(),
            },
            StoreError::NotFound { .. } => Self::NotFound {
                order_id: order_id.to_string(),
            },
            StoreError::VersionConflict { .. } => Self::ConcurrentModification {
                order_id: order_id.to_string(),
                attempts: 1,
            },
            StoreError::Unavailable(reason) => Self::Store(reason),
        }
    }
}

impl From<serde_json::Error> for DeliveryError {
    fn from(error: serde_json::Error) -> Self {
        DeliveryError::Serialization(error.to_string())
    }
}

impl From<ConfigurationError> for DeliveryError {
    fn from(error: ConfigurationError) -> Self {
        DeliveryError::Configuration(error.to_string())
    }
}

pub type DeliveryResult<T> = std::result::Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_concurrent_modification_is_retryable() {
        let conflict = DeliveryError::ConcurrentModification {
            order_id: "O1".into(),
            attempts: 1,
        };
        assert!(conflict.is_retryable());

        let missing = DeliveryError::NoPendingToken {
            order_id: "O1".into(),
            step: None,
        };
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = DeliveryError::NoPendingToken {
            order_id: "O1".into(),
            step: Some(AwaitedStep::DeliveryConfirmation),
        };
        assert_eq!(
            err.to_string(),
            "Order O1 has no pending confirmation for courierConfirmation"
        );

        let err = DeliveryError::InvalidTransition {
            order_id: "O1".into(),
            from: OrderStatus::Received,
            to: OrderStatus::EnRoute,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition for order O1: RECIBIDO -> EN_CAMINO"
        );
    }

    #[test]
    fn test_error_kind_follows_trigger_unless_specific() {
        let missing = DeliveryError::NoPendingToken {
            order_id: "O1".into(),
            step: None,
        };
        assert_eq!(
            missing.error_kind(TriggerKind::FoodReady),
            ErrorKind::AsignacionDespachadorFallida
        );

        let timeout = DeliveryError::TimeoutExpired {
            operation: "signal".into(),
            timeout_ms: 10,
        };
        assert_eq!(
            timeout.error_kind(TriggerKind::FoodReady),
            ErrorKind::TimeoutEntrega
        );

        let unavailable = DeliveryError::AssignmentUnavailable {
            role: Role::Courier,
            restaurant_id: "R1".into(),
        };
        assert_eq!(
            unavailable.error_kind(TriggerKind::PaymentConfirmed),
            ErrorKind::AsignacionRepartidorFallida
        );
    }

    #[test]
    fn test_store_conflict_maps_to_concurrent_modification() {
        let err = DeliveryError::from_store(
            "O9",
            StoreError::VersionConflict {
                key: "O9".into(),
                expected: 2,
                actual: 3,
            },
        );
        assert_eq!(err.kind_name(), "concurrent_modification");
    }
}
