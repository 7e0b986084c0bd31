use super::types::{
    AwaitedStep, CallbackOutcome, Settlement, SignalOutcome, Termination, TokenExpectation,
};
use crate::constants::system;
use crate::error::{DeliveryError, DeliveryResult};
use crate::logging::{log_callback_operation, log_error};
use crate::models::{DeliveryRecord, PendingCallback};
use crate::state_machine::actions::{apply_transition, clear_pending};
use crate::state_machine::guards::ensure_active;
use crate::state_machine::{DeliveryRecordPersistence, OrderStatus};
use crate::workflow::WorkflowSignal;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

/// Tracks the single outstanding external confirmation of each order.
///
/// The token lives on the delivery record itself, so it survives restarts and is
/// visible to every instance. Clearing it is a conditional write; only the caller whose
/// write lands gets to signal the workflow engine.
#[derive(Clone)]
pub struct CallbackTokenRegistry {
    persistence: DeliveryRecordPersistence,
    workflow: Arc<dyn WorkflowSignal>,
    signal_timeout: Duration,
    max_attempts: u32,
}

impl CallbackTokenRegistry {
    pub fn new(
        persistence: DeliveryRecordPersistence,
        workflow: Arc<dyn WorkflowSignal>,
        signal_timeout: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            persistence,
            workflow,
            signal_timeout,
            max_attempts,
        }
    }

    /// Park `order_id` on `token` for `step`.
    ///
    /// Fails with `DuplicatePending` while any token is outstanding for the order.
    #[instrument(skip(self, token))]
    pub async fn register(
        &self,
        order_id: &str,
        step: AwaitedStep,
        token: &str,
    ) -> DeliveryResult<DeliveryRecord> {
        let change = self
            .persistence
            .update(order_id, self.max_attempts, |record| {
                ensure_active(record)?;
                if let Some(existing) = &record.pending_callback {
                    return Err(DeliveryError::DuplicatePending {
                        order_id: record.order_id.clone(),
                        step: existing.step,
                    });
                }
                let now = Utc::now();
                record.pending_callback = Some(PendingCallback {
                    token: token.to_string(),
                    step,
                    registered_at: now,
                });
                record.awaiting_confirmation = true;
                record.updated_at = record.updated_at.max(now);
                Ok(())
            })
            .await?;

        if change.after.status != step.awaited_in() {
            warn!(
                order_id,
                step = %step,
                status = %change.after.status,
                "callback registered outside its usual status"
            );
        }
        log_callback_operation("register", order_id, step.as_str(), "pending");
        Ok(change.after)
    }

    /// The outstanding callback of `order_id`, if any.
    pub async fn pending(&self, order_id: &str) -> DeliveryResult<Option<PendingCallback>> {
        Ok(self.persistence.load(order_id).await?.record.pending_callback)
    }

    /// Clear the pending token and report success to the workflow engine.
    #[instrument(skip(self, result))]
    pub async fn resolve(&self, order_id: &str, result: Value) -> DeliveryResult<DeliveryRecord> {
        self.settle(
            order_id,
            TokenExpectation::any(),
            |_| Ok(()),
            move |_| CallbackOutcome::success(result),
        )
        .await?
        .into_result()
    }

    /// Clear the pending token and report failure to the workflow engine.
    #[instrument(skip(self))]
    pub async fn cancel(&self, order_id: &str, reason: &str) -> DeliveryResult<DeliveryRecord> {
        self.settle(
            order_id,
            TokenExpectation::any(),
            |record| {
                record.cancellation_reason = Some(reason.to_string());
                Ok(())
            },
            |_| CallbackOutcome::failure(system::DELIVERY_CANCELLED, reason),
        )
        .await?
        .into_result()
    }

    /// Move `order_id` to `CANCELADO` or `FALLIDO` with `reason` on record.
    ///
    /// A callback still pending is consumed by the same write and its workflow task is
    /// failed.
    #[instrument(skip(self))]
    pub async fn terminate(
        &self,
        order_id: &str,
        target: OrderStatus,
        reason: &str,
    ) -> DeliveryResult<Termination> {
        let change = self
            .persistence
            .update(order_id, self.max_attempts, |record| {
                if !matches!(target, OrderStatus::Cancelled | OrderStatus::Failed) {
                    return Err(DeliveryError::InvalidTransition {
                        order_id: record.order_id.clone(),
                        from: record.status,
                        to: target,
                    });
                }
                record.cancellation_reason = Some(reason.to_string());
                apply_transition(record, target, None, Utc::now())
            })
            .await?;

        let released = change.released_callback().cloned();
        let signal = match &released {
            Some(callback) => {
                let error_kind = match target {
                    OrderStatus::Cancelled => system::DELIVERY_CANCELLED,
                    _ => system::DELIVERY_FAILED,
                };
                let signal = self
                    .signal(callback, CallbackOutcome::failure(error_kind, reason))
                    .await;
                log_callback_operation("released", order_id, callback.step.as_str(), signal_label(&signal));
                Some(signal)
            }
            None => None,
        };

        Ok(Termination {
            record: change.after,
            released,
            signal,
        })
    }

    /// Consume the pending token matching `expectation`, applying `apply` in the same
    /// conditional write, then signal the engine with whatever `outcome` derives from
    /// the committed record.
    ///
    /// The signal is sent at most once per token: a caller that loses the write race
    /// re-reads, finds no token and gets `NoPendingToken` without signalling. A failed
    /// or timed-out signal does not undo the write; it is reported in the settlement.
    /// Terminal records never hold a token, so they always yield `NoPendingToken`.
    pub async fn settle<A, O>(
        &self,
        order_id: &str,
        expectation: TokenExpectation,
        apply: A,
        outcome: O,
    ) -> DeliveryResult<Settlement>
    where
        A: Fn(&mut DeliveryRecord) -> DeliveryResult<()> + Send + Sync,
        O: FnOnce(&DeliveryRecord) -> CallbackOutcome + Send,
    {
        let change = self
            .persistence
            .update(order_id, self.max_attempts, |record| {
                let matched = !record.status.is_terminal()
                    && record
                        .pending_callback
                        .as_ref()
                        .is_some_and(|pending| expectation.matches(pending));
                if !matched {
                    return Err(DeliveryError::NoPendingToken {
                        order_id: record.order_id.clone(),
                        step: expectation.step,
                    });
                }
                clear_pending(record, Utc::now());
                apply(record)
            })
            .await?;

        let callback = change
            .before
            .pending_callback
            .clone()
            .ok_or_else(|| DeliveryError::NoPendingToken {
                order_id: order_id.to_string(),
                step: expectation.step,
            })?;

        let outcome = outcome(&change.after);
        let label = if outcome.is_success() { "resolved" } else { "cancelled" };
        let signal = self.signal(&callback, outcome).await;
        log_callback_operation(label, order_id, callback.step.as_str(), signal_label(&signal));

        Ok(Settlement {
            record: change.after,
            callback,
            signal,
        })
    }

    async fn signal(&self, callback: &PendingCallback, outcome: CallbackOutcome) -> SignalOutcome {
        let call = async {
            match outcome {
                CallbackOutcome::Success(payload) => {
                    self.workflow.signal_success(&callback.token, payload).await
                }
                CallbackOutcome::Failure { error_kind, cause } => {
                    self.workflow
                        .signal_failure(&callback.token, &error_kind, &cause)
                        .await
                }
            }
        };

        match tokio::time::timeout(self.signal_timeout, call).await {
            Ok(Ok(())) => SignalOutcome::Delivered,
            Ok(Err(err)) => {
                log_error(
                    "callback_registry",
                    "signal",
                    &err.to_string(),
                    Some(callback.step.as_str()),
                );
                SignalOutcome::Failed(err.to_string())
            }
            Err(_) => {
                let timeout_ms = u64::try_from(self.signal_timeout.as_millis()).unwrap_or(u64::MAX);
                log_error(
                    "callback_registry",
                    "signal",
                    "timed out",
                    Some(callback.step.as_str()),
                );
                SignalOutcome::TimedOut { timeout_ms }
            }
        }
    }
}

fn signal_label(signal: &SignalOutcome) -> &'static str {
    match signal {
        SignalOutcome::Delivered => "signalled",
        SignalOutcome::Failed(_) => "signal_failed",
        SignalOutcome::TimedOut { .. } => "signal_timed_out",
    }
}
