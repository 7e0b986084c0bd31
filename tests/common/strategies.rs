//! Property-based testing strategies for lifecycle operations.

#![allow(dead_code)]

use delivery_orchestrator::{OrderStatus, Role};
use proptest::prelude::*;

/// One externally requested change to an order
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleOp {
    Transition(OrderStatus),
    Assign(Role),
    Deliver(String),
}

pub fn status_strategy() -> impl Strategy<Value = OrderStatus> {
    prop_oneof![
        Just(OrderStatus::Received),
        Just(OrderStatus::Preparing),
        Just(OrderStatus::Dispatching),
        Just(OrderStatus::EnRoute),
        Just(OrderStatus::Delivered),
        Just(OrderStatus::Cancelled),
        Just(OrderStatus::Failed),
    ]
}

pub fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Cook), Just(Role::Dispatcher), Just(Role::Courier)]
}

pub fn confirmation_code_strategy() -> impl Strategy<Value = String> {
    "[A-Z0-9]{4,8}"
}

/// Mostly happy-path-leaning ops with illegal ones mixed in
pub fn lifecycle_op_strategy() -> impl Strategy<Value = LifecycleOp> {
    prop_oneof![
        3 => role_strategy().prop_map(LifecycleOp::Assign),
        2 => status_strategy().prop_map(LifecycleOp::Transition),
        1 => confirmation_code_strategy().prop_map(LifecycleOp::Deliver),
    ]
}

pub fn lifecycle_ops_strategy() -> impl Strategy<Value = Vec<LifecycleOp>> {
    prop::collection::vec(lifecycle_op_strategy(), 0..12)
}
