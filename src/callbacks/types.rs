use crate::error::{DeliveryError, DeliveryResult};
use crate::models::{DeliveryRecord, PendingCallback};
use crate::state_machine::OrderStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// External confirmation an order can be parked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AwaitedStep {
    /// Kitchen reports the food is ready
    #[serde(rename = "kitchenConfirmation")]
    FoodPreparation,
    /// Dispatcher reports the order left the restaurant
    #[serde(rename = "dispatchConfirmation")]
    Dispatch,
    /// Courier or customer confirms the hand-off
    #[serde(rename = "courierConfirmation")]
    DeliveryConfirmation,
}

impl AwaitedStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FoodPreparation => "kitchenConfirmation",
            Self::Dispatch => "dispatchConfirmation",
            Self::DeliveryConfirmation => "courierConfirmation",
        }
    }

    /// Status the order is normally in while waiting on this step.
    pub fn awaited_in(&self) -> OrderStatus {
        match self {
            Self::FoodPreparation => OrderStatus::Preparing,
            Self::Dispatch => OrderStatus::Dispatching,
            Self::DeliveryConfirmation => OrderStatus::EnRoute,
        }
    }
}

impl fmt::Display for AwaitedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AwaitedStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kitchenConfirmation" => Ok(Self::FoodPreparation),
            "dispatchConfirmation" => Ok(Self::Dispatch),
            "courierConfirmation" => Ok(Self::DeliveryConfirmation),
            _ => Err(format!("Invalid awaited step: {s}")),
        }
    }
}

/// Which pending callback a settle call is allowed to consume.
///
/// `None` fields match anything; a mismatch is reported as `NoPendingToken`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenExpectation {
    pub step: Option<AwaitedStep>,
    pub token: Option<String>,
}

impl TokenExpectation {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn step(step: AwaitedStep) -> Self {
        Self {
            step: Some(step),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn matches(&self, pending: &PendingCallback) -> bool {
        self.step.map_or(true, |step| step == pending.step)
            && self
                .token
                .as_deref()
                .map_or(true, |token| token == pending.token)
    }
}

/// Signal sent to the workflow engine once the token is cleared.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Success(Value),
    Failure { error_kind: String, cause: String },
}

impl CallbackOutcome {
    pub fn success(payload: Value) -> Self {
        Self::Success(payload)
    }

    pub fn failure(error_kind: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Failure {
            error_kind: error_kind.into(),
            cause: cause.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// What happened when the workflow engine was signalled.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Delivered,
    Failed(String),
    TimedOut { timeout_ms: u64 },
}

/// Result of a committed settle: the record after the write, the callback it consumed
/// and how the signal went. The record is committed regardless of the signal outcome.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub record: DeliveryRecord,
    pub callback: PendingCallback,
    pub signal: SignalOutcome,
}

impl Settlement {
    pub fn signal_delivered(&self) -> bool {
        matches!(self.signal, SignalOutcome::Delivered)
    }

    /// Error describing a failed signal, if any.
    pub fn signal_error(&self) -> Option<DeliveryError> {
        match &self.signal {
            SignalOutcome::Delivered => None,
            SignalOutcome::Failed(reason) => Some(DeliveryError::SignalFailed {
                order_id: self.record.order_id.clone(),
                reason: reason.clone(),
            }),
            SignalOutcome::TimedOut { timeout_ms } => Some(DeliveryError::TimeoutExpired {
                operation: format!("signal {} for order {}", self.callback.step, self.record.order_id),
                timeout_ms: *timeout_ms,
            }),
        }
    }

    /// Collapse into the committed record, surfacing a failed signal as an error.
    pub fn into_result(self) -> DeliveryResult<DeliveryRecord> {
        match self.signal_error() {
            Some(err) => Err(err),
            None => Ok(self.record),
        }
    }
}

/// Result of moving an order to a terminal status outside a confirmation.
#[derive(Debug, Clone)]
pub struct Termination {
    pub record: DeliveryRecord,
    /// Callback the write consumed, if the order was parked on one
    pub released: Option<PendingCallback>,
    /// How the failure signal for `released` went
    pub signal: Option<SignalOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pending(step: AwaitedStep, token: &str) -> PendingCallback {
        PendingCallback {
            token: token.into(),
            step,
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_step_names_round_trip() {
        for step in [
            AwaitedStep::FoodPreparation,
            AwaitedStep::Dispatch,
            AwaitedStep::DeliveryConfirmation,
        ] {
            assert_eq!(step.to_string().parse::<AwaitedStep>().unwrap(), step);
        }
        assert_eq!(
            serde_json::to_string(&AwaitedStep::Dispatch).unwrap(),
            "\"dispatchConfirmation\""
        );
        assert!("deliveryConfirmation".parse::<AwaitedStep>().is_err());
    }

    #[test]
    fn test_expectation_matching() {
        let callback = pending(AwaitedStep::DeliveryConfirmation, "tok-abc");

        assert!(TokenExpectation::any().matches(&callback));
        assert!(TokenExpectation::step(AwaitedStep::DeliveryConfirmation).matches(&callback));
        assert!(!TokenExpectation::step(AwaitedStep::Dispatch).matches(&callback));
        assert!(TokenExpectation::step(AwaitedStep::DeliveryConfirmation)
            .with_token("tok-abc")
            .matches(&callback));
        assert!(!TokenExpectation::any().with_token("tok-xyz").matches(&callback));
    }
}
