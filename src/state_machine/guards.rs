//! Transition guards. Pure checks over a loaded record; no I/O.

use super::states::{OrderStatus, Role};
use crate::error::{DeliveryError, DeliveryResult};
use crate::models::DeliveryRecord;

/// `target` must be a legal successor of the record's current status.
pub fn ensure_transition(record: &DeliveryRecord, target: OrderStatus) -> DeliveryResult<()> {
    if record.status.can_transition_to(target) {
        return Ok(());
    }
    Err(DeliveryError::InvalidTransition {
        order_id: record.order_id.clone(),
        from: record.status,
        to: target,
    })
}

/// Assignment slots are append-only.
pub fn ensure_slot_empty(record: &DeliveryRecord, role: Role) -> DeliveryResult<()> {
    if record.slot(role).is_some() {
        return Err(DeliveryError::AlreadyAssigned {
            order_id: record.order_id.clone(),
            role,
        });
    }
    Ok(())
}

/// Delivery needs `EN_CAMINO`. Already-delivered orders get their own error so that
/// duplicate confirmations are distinguishable from out-of-order ones.
pub fn ensure_deliverable(record: &DeliveryRecord) -> DeliveryResult<()> {
    match record.status {
        OrderStatus::EnRoute => Ok(()),
        OrderStatus::Delivered => Err(DeliveryError::AlreadyDelivered {
            order_id: record.order_id.clone(),
        }),
        other => Err(DeliveryError::InvalidTransition {
            order_id: record.order_id.clone(),
            from: other,
            to: OrderStatus::Delivered,
        }),
    }
}

/// Terminal records accept no further writes of any kind.
pub fn ensure_active(record: &DeliveryRecord) -> DeliveryResult<()> {
    match record.status {
        OrderStatus::Delivered => Err(DeliveryError::AlreadyDelivered {
            order_id: record.order_id.clone(),
        }),
        status if status.is_terminal() => Err(DeliveryError::InvalidTransition {
            order_id: record.order_id.clone(),
            from: status,
            to: status,
        }),
        _ => Ok(()),
    }
}
