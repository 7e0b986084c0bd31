use super::{
    actions::{apply_assignment, apply_delivery, apply_transition},
    persistence::{DeliveryRecordPersistence, DeliveryStore, RecordChange},
    states::{OrderStatus, Role},
};
use crate::constants::indexes;
use crate::error::DeliveryResult;
use crate::logging::log_order_operation;
use crate::models::{ActorProfile, DeliveryRecord, OrderDetail};
use chrono::Utc;
use tracing::{instrument, warn};

/// Owns the legal lifecycle of a delivery record.
///
/// Stateless apart from its store handle, so any number of instances (in one process or
/// many) can operate on the same orders; the store's conditional write arbitrates.
#[derive(Clone)]
pub struct OrderStateMachine {
    persistence: DeliveryRecordPersistence,
    max_conflict_retries: u32,
}

impl OrderStateMachine {
    pub fn new(store: DeliveryStore, max_conflict_retries: u32) -> Self {
        Self {
            persistence: DeliveryRecordPersistence::new(store),
            max_conflict_retries,
        }
    }

    pub fn persistence(&self) -> &DeliveryRecordPersistence {
        &self.persistence
    }

    pub fn max_conflict_retries(&self) -> u32 {
        self.max_conflict_retries
    }

    /// Create the record in `RECIBIDO`. Fails with `AlreadyExists` on a second call.
    #[instrument(skip(self, detail), fields(order_id = %detail.order_id))]
    pub async fn create(&self, detail: OrderDetail) -> DeliveryResult<DeliveryRecord> {
        let record = self
            .persistence
            .create(DeliveryRecord::new(detail, Utc::now()))
            .await?;
        log_order_operation("create", &record.order_id, record.status, None);
        Ok(record)
    }

    /// Create the record with its cook already assigned, as a single write.
    #[instrument(skip(self, detail, cook), fields(order_id = %detail.order_id, cook_id = %cook.id))]
    pub async fn create_with_cook(
        &self,
        detail: OrderDetail,
        cook: ActorProfile,
    ) -> DeliveryResult<DeliveryRecord> {
        let now = Utc::now();
        let mut record = DeliveryRecord::new(detail, now);
        apply_assignment(&mut record, Role::Cook, cook, now)?;
        let record = self.persistence.create(record).await?;
        log_order_operation("create_with_cook", &record.order_id, record.status, None);
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        order_id: &str,
        target: OrderStatus,
        actor: Option<String>,
    ) -> DeliveryResult<DeliveryRecord> {
        Ok(self.transition_change(order_id, target, actor).await?.after)
    }

    /// Like [`transition`](Self::transition), but returns both sides of the write.
    ///
    /// A terminal target consumes any pending callback; it is reported through
    /// [`RecordChange::released_callback`] so the caller can fail the parked task.
    pub async fn transition_change(
        &self,
        order_id: &str,
        target: OrderStatus,
        actor: Option<String>,
    ) -> DeliveryResult<RecordChange> {
        let change = self
            .persistence
            .update(order_id, self.max_conflict_retries, |record| {
                apply_transition(record, target, actor.clone(), Utc::now())
            })
            .await?;
        warn_released(&change);
        log_order_operation("transition", order_id, change.after.status, None);
        Ok(change)
    }

    /// Fill `role`'s slot and move to the status that role implies.
    #[instrument(skip(self, profile), fields(actor_id = %profile.id))]
    pub async fn assign(
        &self,
        order_id: &str,
        role: Role,
        profile: ActorProfile,
    ) -> DeliveryResult<DeliveryRecord> {
        let change = self
            .persistence
            .update(order_id, self.max_conflict_retries, |record| {
                apply_assignment(record, role, profile.clone(), Utc::now())
            })
            .await?;
        log_order_operation(
            "assign",
            order_id,
            change.after.status,
            Some(&format!("{role} {}", profile.id)),
        );
        Ok(change.after)
    }

    #[instrument(skip(self, confirmation_code))]
    pub async fn mark_delivered(
        &self,
        order_id: &str,
        confirmation_code: &str,
    ) -> DeliveryResult<DeliveryRecord> {
        let change = self
            .persistence
            .update(order_id, self.max_conflict_retries, |record| {
                apply_delivery(record, confirmation_code, Utc::now())
            })
            .await?;
        warn_released(&change);
        log_order_operation("mark_delivered", order_id, change.after.status, None);
        Ok(change.after)
    }

    pub async fn get(&self, order_id: &str) -> DeliveryResult<DeliveryRecord> {
        Ok(self.persistence.load(order_id).await?.record)
    }

    pub async fn list_by_restaurant(&self, restaurant_id: &str) -> DeliveryResult<Vec<DeliveryRecord>> {
        self.persistence
            .query(indexes::RESTAURANT_ID, restaurant_id)
            .await
    }

    pub async fn list_by_status(&self, status: OrderStatus) -> DeliveryResult<Vec<DeliveryRecord>> {
        self.persistence.query(indexes::STATUS, status.as_str()).await
    }
}

fn warn_released(change: &RecordChange) {
    if let Some(callback) = change.released_callback() {
        warn!(
            order_id = %change.after.order_id,
            step = %callback.step,
            status = %change.after.status,
            "pending callback released by terminal write"
        );
    }
}
