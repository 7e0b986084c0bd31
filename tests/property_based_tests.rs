mod common;

use common::strategies::*;
use common::OrderBuilder;
use delivery_orchestrator::store::InMemoryRecordStore;
use delivery_orchestrator::{ActorProfile, DeliveryError, OrderStateMachine, OrderStatus, Role};
use proptest::prelude::*;
use std::sync::Arc;

fn profile(role: Role) -> ActorProfile {
    match role {
        Role::Cook => ActorProfile::new("COC-1", "Juan"),
        Role::Dispatcher => ActorProfile::new("DES-1", "Ana"),
        Role::Courier => ActorProfile::courier("REP-1", "Luis", "Moto", 30),
    }
}

proptest! {
    /// Property: whatever sequence of requests arrives, the stored history stays
    /// non-empty, time-ordered and ends at the current status
    #[test]
    fn history_invariants_hold_for_any_op_sequence(ops in lifecycle_ops_strategy()) {
        let outcome: Result<(), TestCaseError> = tokio_test::block_on(async {
            let machine = OrderStateMachine::new(Arc::new(InMemoryRecordStore::new()), 3);
            let created = machine.create(OrderBuilder::new().with_order_id("P1").detail()).await.unwrap();
            let mut expected_len = created.status_history.len();

            for op in ops {
                let result = match op {
                    LifecycleOp::Transition(target) => machine.transition("P1", target, None).await,
                    LifecycleOp::Assign(role) => machine.assign("P1", role, profile(role)).await,
                    LifecycleOp::Deliver(code) => machine.mark_delivered("P1", &code).await,
                };
                if result.is_ok() {
                    expected_len += 1;
                }

                let record = machine.get("P1").await.unwrap();
                prop_assert!(record.is_consistent());
                prop_assert_eq!(record.status_history.len(), expected_len);
            }
            Ok(())
        });
        outcome?;
    }

    /// Property: a successful transition always targets a legal successor
    #[test]
    fn only_legal_transitions_succeed(path in prop::collection::vec(status_strategy(), 1..8)) {
        let outcome: Result<(), TestCaseError> = tokio_test::block_on(async {
            let machine = OrderStateMachine::new(Arc::new(InMemoryRecordStore::new()), 3);
            machine.create(OrderBuilder::new().with_order_id("P2").detail()).await.unwrap();

            for target in path {
                let before = machine.get("P2").await.unwrap().status;
                match machine.transition("P2", target, None).await {
                    Ok(after) => {
                        prop_assert!(before.can_transition_to(target));
                        prop_assert_eq!(after.status, target);
                    }
                    Err(DeliveryError::InvalidTransition { from, to, .. }) => {
                        prop_assert!(!before.can_transition_to(target));
                        prop_assert_eq!(from, before);
                        prop_assert_eq!(to, target);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other}"),
                }
            }
            Ok(())
        });
        outcome?;
    }

    /// Property: wire names parse back to the same status
    #[test]
    fn status_wire_names_parse_back(status in status_strategy()) {
        let parsed: OrderStatus = status.as_str().parse().unwrap();
        prop_assert_eq!(parsed, status);
    }
}
