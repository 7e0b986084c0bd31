//! Record mutations applied after the guards pass.
//!
//! Each function changes an in-memory copy of a [`DeliveryRecord`]; nothing is written
//! until the caller commits the copy through the store. Every status change appends
//! exactly one history entry.

use super::guards::{ensure_deliverable, ensure_slot_empty, ensure_transition};
use super::states::{OrderStatus, Role};
use crate::error::DeliveryResult;
use crate::models::{ActorProfile, AssignedActor, DeliveryRecord, StatusHistoryEntry};
use chrono::{DateTime, Utc};

/// Move to `target`, recording `actor` in the history.
///
/// A terminal target also drops any pending callback in the same write.
pub fn apply_transition(
    record: &mut DeliveryRecord,
    target: OrderStatus,
    actor: Option<String>,
    now: DateTime<Utc>,
) -> DeliveryResult<()> {
    ensure_transition(record, target)?;
    push_history(record, target, actor, now);
    if target.is_terminal() {
        clear_pending(record, now);
    }
    Ok(())
}

/// Fill the role's slot and move to the status that role implies.
pub fn apply_assignment(
    record: &mut DeliveryRecord,
    role: Role,
    profile: ActorProfile,
    now: DateTime<Utc>,
) -> DeliveryResult<()> {
    ensure_slot_empty(record, role)?;
    let target = role.target_status();
    ensure_transition(record, target)?;

    let actor_id = profile.id.clone();
    let stamp = next_timestamp(record, now);
    *record.slot_mut(role) = Some(AssignedActor::from_profile(profile, stamp));
    push_history(record, target, Some(actor_id), now);
    Ok(())
}

/// Terminal success: stamps `delivered_at` and the confirmation code, and drops any
/// pending callback.
pub fn apply_delivery(
    record: &mut DeliveryRecord,
    confirmation_code: &str,
    now: DateTime<Utc>,
) -> DeliveryResult<()> {
    ensure_deliverable(record)?;
    let actor = record.courier.as_ref().map(|courier| courier.id.clone());
    let stamp = next_timestamp(record, now);
    record.delivered_at = Some(stamp);
    record.confirmation_code = Some(confirmation_code.to_string());
    push_history(record, OrderStatus::Delivered, actor, now);
    clear_pending(record, now);
    Ok(())
}

/// Drop the pending token and the awaiting flag together.
pub fn clear_pending(record: &mut DeliveryRecord, now: DateTime<Utc>) {
    record.pending_callback = None;
    record.awaiting_confirmation = false;
    record.updated_at = record.updated_at.max(now);
}

fn push_history(
    record: &mut DeliveryRecord,
    status: OrderStatus,
    actor: Option<String>,
    now: DateTime<Utc>,
) {
    let timestamp = next_timestamp(record, now);
    record.status = status;
    record.updated_at = timestamp;
    record.status_history.push(StatusHistoryEntry {
        status,
        timestamp,
        actor,
    });
}

/// Wall clocks on different instances disagree; history must not go backwards.
fn next_timestamp(record: &DeliveryRecord, now: DateTime<Utc>) -> DateTime<Utc> {
    record
        .last_history_timestamp()
        .map_or(now, |last| last.max(now))
}
