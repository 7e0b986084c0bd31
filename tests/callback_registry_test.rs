mod common;

use common::OrderBuilder;
use delivery_orchestrator::callbacks::{AwaitedStep, CallbackTokenRegistry, SignalOutcome};
use delivery_orchestrator::state_machine::DeliveryRecordPersistence;
use delivery_orchestrator::store::InMemoryRecordStore;
use delivery_orchestrator::workflow::SignalKind;
use delivery_orchestrator::{
    ActorProfile, DeliveryError, InProcessWorkflowEngine, OrderStateMachine, OrderStatus, Role,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    machine: OrderStateMachine,
    registry: CallbackTokenRegistry,
    engine: InProcessWorkflowEngine,
}

async fn fixture(order_id: &str) -> Fixture {
    let machine = OrderStateMachine::new(Arc::new(InMemoryRecordStore::new()), 3);
    machine
        .create(OrderBuilder::new().with_order_id(order_id).detail())
        .await
        .unwrap();
    let engine = InProcessWorkflowEngine::new();
    let persistence: DeliveryRecordPersistence = machine.persistence().clone();
    let registry = CallbackTokenRegistry::new(
        persistence,
        Arc::new(engine.clone()),
        Duration::from_millis(500),
        3,
    );
    Fixture {
        machine,
        registry,
        engine,
    }
}

#[tokio::test]
async fn test_second_registration_is_duplicate_pending() {
    let f = fixture("O2").await;
    f.registry
        .register("O2", AwaitedStep::DeliveryConfirmation, "tok-abc")
        .await
        .unwrap();

    let err = f
        .registry
        .register("O2", AwaitedStep::DeliveryConfirmation, "tok-xyz")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DeliveryError::DuplicatePending {
            order_id: "O2".into(),
            step: AwaitedStep::DeliveryConfirmation,
        }
    );
    let pending = f.registry.pending("O2").await.unwrap().unwrap();
    assert_eq!(pending.token, "tok-abc");
}

#[tokio::test]
async fn test_resolve_twice_signals_once() {
    let f = fixture("O3").await;
    f.registry
        .register("O3", AwaitedStep::FoodPreparation, "tok-1")
        .await
        .unwrap();

    let record = f.registry.resolve("O3", json!({"ok": true})).await.unwrap();
    assert!(!record.awaiting_confirmation);
    assert!(record.pending_callback.is_none());

    let err = f.registry.resolve("O3", json!({"ok": true})).await.unwrap_err();
    assert!(matches!(err, DeliveryError::NoPendingToken { .. }));
    assert_eq!(f.engine.signal_count("tok-1"), 1);
}

#[tokio::test]
async fn test_concurrent_resolve_signals_exactly_once() {
    let f = fixture("O4").await;
    f.registry
        .register("O4", AwaitedStep::Dispatch, "tok-race")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..6 {
        let registry = f.registry.clone();
        handles.push(tokio::spawn(async move {
            registry.resolve("O4", json!({ "attempt": i })).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(DeliveryError::NoPendingToken { .. })
            | Err(DeliveryError::ConcurrentModification { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(f.engine.signal_count("tok-race"), 1);
}

#[tokio::test]
async fn test_resolve_and_cancel_race_signals_once() {
    let f = fixture("O5").await;
    f.registry
        .register("O5", AwaitedStep::DeliveryConfirmation, "tok-5")
        .await
        .unwrap();

    let resolver = f.registry.clone();
    let canceller = f.registry.clone();
    let (resolved, cancelled) = tokio::join!(
        async move { resolver.resolve("O5", json!({})).await },
        async move { canceller.cancel("O5", "timeout").await },
    );
    assert!(resolved.is_ok() ^ cancelled.is_ok());
    assert_eq!(f.engine.signals().len(), 1);
}

#[tokio::test]
async fn test_token_survives_reload_through_store() {
    let f = fixture("O6").await;
    f.registry
        .register("O6", AwaitedStep::FoodPreparation, "tok-6")
        .await
        .unwrap();

    // A second registry over the same store, as another instance would have
    let other = CallbackTokenRegistry::new(
        f.machine.persistence().clone(),
        Arc::new(f.engine.clone()),
        Duration::from_millis(500),
        3,
    );
    let record = other.resolve("O6", json!({})).await.unwrap();
    assert!(record.pending_callback.is_none());
    assert_eq!(f.engine.signal_count("tok-6"), 1);
}

#[tokio::test]
async fn test_register_on_delivered_order_is_rejected() {
    let f = fixture("O7").await;
    for target in [
        delivery_orchestrator::OrderStatus::Preparing,
        delivery_orchestrator::OrderStatus::Dispatching,
        delivery_orchestrator::OrderStatus::EnRoute,
        delivery_orchestrator::OrderStatus::Delivered,
    ] {
        f.machine.transition("O7", target, None).await.unwrap();
    }

    let err = f
        .registry
        .register("O7", AwaitedStep::DeliveryConfirmation, "tok-7")
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::AlreadyDelivered { .. }));
}

#[tokio::test]
async fn test_cancelling_order_consumes_pending_token() {
    let f = fixture("O8").await;
    f.machine
        .assign("O8", Role::Cook, ActorProfile::new("COC-1", "Juan"))
        .await
        .unwrap();
    f.registry
        .register("O8", AwaitedStep::FoodPreparation, "tok")
        .await
        .unwrap();

    let change = f
        .machine
        .transition_change("O8", OrderStatus::Cancelled, None)
        .await
        .unwrap();
    assert_eq!(change.after.status, OrderStatus::Cancelled);
    assert!(change.after.pending_callback.is_none());
    assert!(!change.after.awaiting_confirmation);
    assert_eq!(change.released_callback().unwrap().token, "tok");

    let err = f.registry.resolve("O8", json!({"ok": true})).await.unwrap_err();
    assert!(matches!(err, DeliveryError::NoPendingToken { .. }));
    assert!(f.engine.signals().is_empty());
    assert!(f.registry.pending("O8").await.unwrap().is_none());
}

#[tokio::test]
async fn test_terminate_signals_failure_for_released_token() {
    let f = fixture("O9").await;
    f.machine
        .assign("O9", Role::Cook, ActorProfile::new("COC-1", "Juan"))
        .await
        .unwrap();
    f.registry
        .register("O9", AwaitedStep::FoodPreparation, "tok-9")
        .await
        .unwrap();

    let termination = f
        .registry
        .terminate("O9", OrderStatus::Cancelled, "customer cancelled")
        .await
        .unwrap();
    assert_eq!(termination.record.status, OrderStatus::Cancelled);
    assert_eq!(termination.record.cancellation_reason.as_deref(), Some("customer cancelled"));
    assert_eq!(termination.released.unwrap().token, "tok-9");
    assert_eq!(termination.signal, Some(SignalOutcome::Delivered));

    let signals = f.engine.signals();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].token, "tok-9");
    assert!(matches!(signals[0].kind, SignalKind::Failure { .. }));

    // Nothing left to resolve, and no success is ever sent for the cancelled order
    assert!(f.registry.resolve("O9", json!({"ok": true})).await.is_err());
    assert_eq!(f.engine.signal_count("tok-9"), 1);
}

#[tokio::test]
async fn test_terminate_without_pending_token_sends_nothing() {
    let f = fixture("O10").await;
    let termination = f
        .registry
        .terminate("O10", OrderStatus::Failed, "lost")
        .await
        .unwrap();
    assert_eq!(termination.record.status, OrderStatus::Failed);
    assert!(termination.released.is_none());
    assert!(termination.signal.is_none());
    assert!(f.engine.signals().is_empty());
}
