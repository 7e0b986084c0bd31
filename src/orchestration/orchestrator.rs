//! # Delivery Orchestrator
//!
//! Drives an order from payment to doorstep. Each trigger is handled as:
//!
//! 1. shape check of the payload
//! 2. actor selection through the [`AssignmentResolver`], when the trigger staffs a role
//! 3. one conditional write that applies the transition and consumes the matching
//!    callback token, followed by exactly one workflow signal
//! 4. the lifecycle event on the bus and a status push to the restaurant's subscribers
//!
//! Failures leave the record as it was, publish an `ErrorDelivery` event tagged with the
//! matching [`ErrorKind`] and come back to the caller as a typed [`DeliveryError`]. A
//! redelivered payment for an existing order is the exception: it is logged and returned
//! as `AlreadyExists` without an error event. Only lost write races are retried, inside
//! the persistence layer.

use super::types::{
    ConfirmationReceipt, ConfirmationRequest, Trigger, TriggerKind, TriggerOutcome,
};
use crate::callbacks::{
    AwaitedStep, CallbackOutcome, CallbackTokenRegistry, Settlement, SignalOutcome, TokenExpectation,
};
use crate::error::{DeliveryError, DeliveryResult};
use crate::events::{DeliveryEventPublisher, ErrorKind, InboundEvent, OutboundEvent, PagoConfirmado};
use crate::logging::{log_error, log_order_operation};
use crate::models::{DeliveryRecord, DeliveryStatusView};
use crate::notifications::{BroadcastSummary, NotificationFanout};
use crate::services::{AssignmentContext, AssignmentResolver};
use crate::state_machine::actions::{apply_assignment, apply_delivery, apply_transition};
use crate::state_machine::{OrderStateMachine, OrderStatus, Role};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A committed write and, if the workflow engine could not be told, why.
struct Committed {
    record: DeliveryRecord,
    signal_error: Option<DeliveryError>,
}

impl From<Settlement> for Committed {
    fn from(settlement: Settlement) -> Self {
        Self {
            signal_error: settlement.signal_error(),
            record: settlement.record,
        }
    }
}

impl From<DeliveryRecord> for Committed {
    fn from(record: DeliveryRecord) -> Self {
        Self {
            record,
            signal_error: None,
        }
    }
}

#[derive(Clone)]
pub struct DeliveryOrchestrator {
    state_machine: OrderStateMachine,
    callbacks: CallbackTokenRegistry,
    resolver: Arc<dyn AssignmentResolver>,
    publisher: DeliveryEventPublisher,
    fanout: NotificationFanout,
}

impl DeliveryOrchestrator {
    pub fn new(
        state_machine: OrderStateMachine,
        callbacks: CallbackTokenRegistry,
        resolver: Arc<dyn AssignmentResolver>,
        publisher: DeliveryEventPublisher,
        fanout: NotificationFanout,
    ) -> Self {
        Self {
            state_machine,
            callbacks,
            resolver,
            publisher,
            fanout,
        }
    }

    pub fn state_machine(&self) -> &OrderStateMachine {
        &self.state_machine
    }

    pub fn callbacks(&self) -> &CallbackTokenRegistry {
        &self.callbacks
    }

    pub fn fanout(&self) -> &NotificationFanout {
        &self.fanout
    }

    pub fn publisher(&self) -> &DeliveryEventPublisher {
        &self.publisher
    }

    /// Decode an event from the bus and handle it
    #[instrument(skip(self, detail))]
    pub async fn handle_inbound(&self, detail_type: &str, detail: Value) -> DeliveryResult<TriggerOutcome> {
        let event = InboundEvent::parse(detail_type, detail).map_err(|err| {
            log_error("DeliveryOrchestrator", "handle_inbound", &err.to_string(), Some(detail_type));
            err
        })?;
        self.handle(Trigger::from(event)).await
    }

    #[instrument(skip(self, trigger), fields(kind = %trigger.kind(), order_id = %trigger.order_id()))]
    pub async fn handle(&self, trigger: Trigger) -> DeliveryResult<TriggerOutcome> {
        let kind = trigger.kind();
        let order_id = trigger.order_id().to_string();

        let committed = match self.apply(trigger).await {
            Ok(committed) => committed,
            Err(err @ DeliveryError::AlreadyExists { .. }) if kind == TriggerKind::PaymentConfirmed => {
                // Redelivered payment; the order is already staffed
                warn!(order_id = %order_id, "duplicate payment event ignored");
                return Err(err);
            }
            Err(err) => {
                self.report_failure(kind, &order_id, &err).await;
                return Err(err);
            }
        };

        // The write stands even if the engine was not told; announce it, then surface
        let broadcast = self.announce(kind, &committed.record).await;
        if let Some(err) = committed.signal_error {
            self.report_failure(kind, &order_id, &err).await;
            return Err(err);
        }

        info!(
            order_id = %order_id,
            kind = %kind,
            status = %committed.record.status,
            "trigger handled"
        );
        Ok(TriggerOutcome {
            kind,
            record: committed.record,
            broadcast,
        })
    }

    async fn apply(&self, trigger: Trigger) -> DeliveryResult<Committed> {
        trigger.validate()?;
        match trigger {
            Trigger::PaymentConfirmed(event) => self.start_order(event).await.map(Committed::from),
            Trigger::FoodReady(event) => {
                let expectation = TokenExpectation::step(AwaitedStep::FoodPreparation)
                    .with_token(event.task_token);
                self.assign_and_resolve(&event.order_id, Role::Dispatcher, expectation)
                    .await
            }
            Trigger::Dispatched(event) => {
                let expectation =
                    TokenExpectation::step(AwaitedStep::Dispatch).with_token(event.task_token);
                self.assign_and_resolve(&event.order_id, Role::Courier, expectation)
                    .await
            }
            Trigger::DeliveryConfirmedExternally(event) => {
                let expectation = TokenExpectation::step(AwaitedStep::DeliveryConfirmation)
                    .with_token(event.task_token);
                let request = ConfirmationRequest::new(event.confirmation_code);
                self.settle_delivery(&event.order_id, expectation, request).await
            }
            Trigger::DeliveryConfirmedViaDirectRequest(direct) => {
                let expectation = TokenExpectation::step(AwaitedStep::DeliveryConfirmation);
                self.settle_delivery(&direct.order_id, expectation, direct.request)
                    .await
            }
        }
    }

    /// Create the record with its cook in one write. Nothing is stored when no cook is
    /// available.
    async fn start_order(&self, event: PagoConfirmado) -> DeliveryResult<DeliveryRecord> {
        let detail = event.into_order_detail();
        let ctx = AssignmentContext {
            order_id: detail.order_id.clone(),
            restaurant_id: detail.restaurant_id.clone(),
            delivery_address: Some(detail.delivery_address.clone()),
        };
        let cook = self.resolver.select_cook(&ctx).await?;
        self.state_machine.create_with_cook(detail, cook).await
    }

    /// Staff `role` and consume the token of the step that just finished, in one write.
    async fn assign_and_resolve(
        &self,
        order_id: &str,
        role: Role,
        expectation: TokenExpectation,
    ) -> DeliveryResult<Committed> {
        let current = self.state_machine.get(order_id).await?;
        let ctx = AssignmentContext {
            order_id: current.order_id.clone(),
            restaurant_id: current.restaurant_id().to_string(),
            delivery_address: Some(current.order_detail.delivery_address.clone()),
        };

        let profile = match self.resolver.select(role, &ctx).await {
            Ok(profile) => profile,
            Err(selection) => {
                let err = DeliveryError::from(selection);
                self.abandon(order_id, expectation, ErrorKind::for_assignment(role), &err)
                    .await;
                return Err(err);
            }
        };

        let settlement = self
            .callbacks
            .settle(
                order_id,
                expectation,
                |record| apply_assignment(record, role, profile.clone(), Utc::now()),
                |record| CallbackOutcome::success(assignment_payload(record, role)),
            )
            .await?;
        log_order_operation(
            "assign_and_resolve",
            order_id,
            settlement.record.status,
            Some(&format!("{role} {}", profile.id)),
        );
        Ok(settlement.into())
    }

    async fn settle_delivery(
        &self,
        order_id: &str,
        expectation: TokenExpectation,
        request: ConfirmationRequest,
    ) -> DeliveryResult<Committed> {
        let ConfirmationRequest {
            confirmation_code,
            customer_signature,
            notes,
        } = request;

        let settlement = self
            .callbacks
            .settle(
                order_id,
                expectation,
                move |record| {
                    apply_delivery(record, &confirmation_code, Utc::now())?;
                    record.customer_signature = customer_signature.clone();
                    record.delivery_notes = notes.clone();
                    Ok(())
                },
                |record| CallbackOutcome::success(delivery_payload(record)),
            )
            .await?;
        log_order_operation("deliver", order_id, settlement.record.status, None);
        Ok(settlement.into())
    }

    /// Fail the outstanding token after an assignment could not be made.
    async fn abandon(
        &self,
        order_id: &str,
        expectation: TokenExpectation,
        kind: ErrorKind,
        cause: &DeliveryError,
    ) {
        let message = cause.to_string();
        let result = self
            .callbacks
            .settle(
                order_id,
                expectation,
                |record| {
                    record.cancellation_reason = Some(message.clone());
                    Ok(())
                },
                |_| CallbackOutcome::failure(kind.as_str(), message.as_str()),
            )
            .await;

        match result {
            Ok(settlement) => {
                if let Some(err) = settlement.signal_error() {
                    log_error("DeliveryOrchestrator", "abandon", &err.to_string(), Some(order_id));
                }
            }
            Err(err) => log_error("DeliveryOrchestrator", "abandon", &err.to_string(), Some(order_id)),
        }
    }

    /// Park the order's workflow task until the matching confirmation arrives.
    #[instrument(skip(self, token))]
    pub async fn await_confirmation(
        &self,
        order_id: &str,
        step: AwaitedStep,
        token: &str,
    ) -> DeliveryResult<DeliveryRecord> {
        self.callbacks.register(order_id, step, token).await
    }

    /// Supervisory timeout: fail the pending token and the order in one write.
    #[instrument(skip(self))]
    pub async fn handle_confirmation_timeout(
        &self,
        order_id: &str,
        reason: &str,
    ) -> DeliveryResult<DeliveryRecord> {
        let settlement = self
            .callbacks
            .settle(
                order_id,
                TokenExpectation::any(),
                |record| {
                    record.cancellation_reason = Some(reason.to_string());
                    apply_transition(record, OrderStatus::Failed, None, Utc::now())
                },
                |_| CallbackOutcome::failure(ErrorKind::TimeoutEntrega.as_str(), reason),
            )
            .await
            .map_err(|err| {
                log_error("DeliveryOrchestrator", "confirmation_timeout", &err.to_string(), Some(order_id));
                err
            })?;

        if let Err(err) = self
            .publisher
            .publish_error(order_id, ErrorKind::TimeoutEntrega, reason)
            .await
        {
            log_error("DeliveryOrchestrator", "publish", &err.to_string(), Some(order_id));
        }
        self.notify(&settlement.record, None).await;
        log_order_operation("confirmation_timeout", order_id, settlement.record.status, Some(reason));
        settlement.into_result()
    }

    /// Cancel an order from any active status. A workflow task parked on the order is
    /// failed in the same step; the record is committed even if that signal fails.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str, reason: &str) -> DeliveryResult<DeliveryRecord> {
        let termination = self
            .callbacks
            .terminate(order_id, OrderStatus::Cancelled, reason)
            .await
            .map_err(|err| {
                log_error("DeliveryOrchestrator", "cancel_order", &err.to_string(), Some(order_id));
                err
            })?;

        if let Some(SignalOutcome::Failed(cause)) = &termination.signal {
            log_error("DeliveryOrchestrator", "cancel_order", cause, Some(order_id));
        }
        self.notify(&termination.record, None).await;
        log_order_operation("cancel_order", order_id, termination.record.status, Some(reason));
        Ok(termination.record)
    }

    /// Confirmation submitted directly by the courier or customer.
    pub async fn confirm_delivery(
        &self,
        order_id: &str,
        request: ConfirmationRequest,
    ) -> DeliveryResult<ConfirmationReceipt> {
        let outcome = self
            .handle(Trigger::direct_confirmation(order_id, request))
            .await?;
        ConfirmationReceipt::from_record(&outcome.record)
    }

    pub async fn order_status(&self, order_id: &str) -> DeliveryResult<DeliveryStatusView> {
        let record = self.state_machine.get(order_id).await?;
        Ok(DeliveryStatusView::from(&record))
    }

    /// Lifecycle event and status push after a committed write. Failures are logged only.
    async fn announce(&self, kind: TriggerKind, record: &DeliveryRecord) -> Option<BroadcastSummary> {
        let event = match kind {
            TriggerKind::PaymentConfirmed => OutboundEvent::in_preparation(record),
            TriggerKind::FoodReady => OutboundEvent::in_dispatch(record),
            TriggerKind::Dispatched => OutboundEvent::en_route(record),
            TriggerKind::DeliveryConfirmedExternally
            | TriggerKind::DeliveryConfirmedViaDirectRequest => OutboundEvent::delivered(record),
        };

        let extra = match event {
            Ok(event) => {
                let extra = status_extras(&event);
                if let Err(err) = self.publisher.publish(event).await {
                    log_error("DeliveryOrchestrator", "publish", &err.to_string(), Some(&record.order_id));
                }
                extra
            }
            Err(err) => {
                log_error("DeliveryOrchestrator", "build_event", &err.to_string(), Some(&record.order_id));
                None
            }
        };

        self.notify(record, extra).await
    }

    async fn notify(&self, record: &DeliveryRecord, extra: Option<Map<String, Value>>) -> Option<BroadcastSummary> {
        match self
            .fanout
            .notify_order_status_update(record.restaurant_id(), &record.order_id, record.status, extra)
            .await
        {
            Ok(summary) => Some(summary),
            Err(err) => {
                log_error("DeliveryOrchestrator", "notify", &err.to_string(), Some(&record.order_id));
                None
            }
        }
    }

    async fn report_failure(&self, kind: TriggerKind, order_id: &str, err: &DeliveryError) {
        let error_kind = err.error_kind(kind);
        log_error(
            "DeliveryOrchestrator",
            kind.as_str(),
            &err.to_string(),
            Some(order_id),
        );
        if let Err(publish_err) = self
            .publisher
            .publish_error(order_id, error_kind, err.to_string())
            .await
        {
            log_error("DeliveryOrchestrator", "publish", &publish_err.to_string(), Some(order_id));
        } else {
            debug!(order_id, error_kind = %error_kind, "error event published");
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Signal payload when a role has been staffed
fn assignment_payload(record: &DeliveryRecord, role: Role) -> Value {
    let mut payload = json!({
        "orderId": record.order_id,
        "timestamp": now_rfc3339(),
    });
    if let (Some(actor), Some(map)) = (record.slot(role), payload.as_object_mut()) {
        let prefix = match role {
            Role::Cook => "cocinero",
            Role::Dispatcher => "despachador",
            Role::Courier => "repartidor",
        };
        map.insert(format!("{prefix}Id"), Value::from(actor.id.clone()));
        map.insert(format!("{prefix}Nombre"), Value::from(actor.name.clone()));
        if let Some(vehicle) = &actor.vehicle {
            map.insert("vehiculo".into(), Value::from(vehicle.clone()));
        }
        if let Some(minutes) = actor.estimated_minutes {
            map.insert("estimatedDeliveryTime".into(), Value::from(minutes));
        }
    }
    payload
}

/// Signal payload for a delivered order, with the real elapsed minutes
fn delivery_payload(record: &DeliveryRecord) -> Value {
    let delivered_at = record.delivered_at.unwrap_or_else(Utc::now);
    json!({
        "orderId": record.order_id,
        "timestamp": now_rfc3339(),
        "confirmationCode": record.confirmation_code,
        "totalTime": record.elapsed_minutes(delivered_at),
    })
}

/// Event fields worth pushing to subscribers next to the status itself
fn status_extras(event: &OutboundEvent) -> Option<Map<String, Value>> {
    let mut extra = event.detail().ok()?.as_object()?.clone();
    for key in ["orderId", "status", "timestamp"] {
        extra.remove(key);
    }
    Some(extra)
}
