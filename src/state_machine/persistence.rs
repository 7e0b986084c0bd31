use crate::error::{DeliveryError, DeliveryResult};
use crate::models::{DeliveryRecord, PendingCallback};
use crate::store::{RecordStore, Versioned};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Shared handle to whatever store backs delivery records.
pub type DeliveryStore = Arc<dyn RecordStore<DeliveryRecord>>;

/// The two sides of one committed write.
#[derive(Debug, Clone)]
pub struct RecordChange {
    pub before: DeliveryRecord,
    pub after: DeliveryRecord,
}

impl RecordChange {
    /// The callback this write consumed, if the record had one and no longer does.
    pub fn released_callback(&self) -> Option<&PendingCallback> {
        match (&self.before.pending_callback, &self.after.pending_callback) {
            (Some(released), None) => Some(released),
            _ => None,
        }
    }
}

/// Read/compute/write access to delivery records.
///
/// All mutations funnel through [`DeliveryRecordPersistence::update`]: load the current
/// version, let the caller change a copy, then write it back only if nobody else wrote
/// in between.
#[derive(Clone)]
pub struct DeliveryRecordPersistence {
    store: DeliveryStore,
}

impl DeliveryRecordPersistence {
    pub fn new(store: DeliveryStore) -> Self {
        Self { store }
    }

    pub async fn create(&self, record: DeliveryRecord) -> DeliveryResult<DeliveryRecord> {
        let order_id = record.order_id.clone();
        self.store
            .create_if_absent(&order_id, record)
            .await
            .map(Versioned::into_record)
            .map_err(|err| DeliveryError::from_store(&order_id, err))
    }

    pub async fn find(&self, order_id: &str) -> DeliveryResult<Option<Versioned<DeliveryRecord>>> {
        self.store
            .get_by_key(order_id)
            .await
            .map_err(|err| DeliveryError::from_store(order_id, err))
    }

    pub async fn load(&self, order_id: &str) -> DeliveryResult<Versioned<DeliveryRecord>> {
        self.find(order_id)
            .await?
            .ok_or_else(|| DeliveryError::NotFound {
                order_id: order_id.to_string(),
            })
    }

    /// Write `next` iff the stored version is still `expected_version`.
    pub async fn commit(
        &self,
        order_id: &str,
        expected_version: u64,
        next: DeliveryRecord,
    ) -> DeliveryResult<DeliveryRecord> {
        self.store
            .conditional_update(order_id, expected_version, Box::new(move |record| *record = next))
            .await
            .map(Versioned::into_record)
            .map_err(|err| DeliveryError::from_store(order_id, err))
    }

    pub async fn query(&self, index_name: &str, value: &str) -> DeliveryResult<Vec<DeliveryRecord>> {
        let records = self
            .store
            .query_by_index(index_name, value)
            .await
            .map_err(|err| DeliveryError::Store(err.to_string()))?;
        Ok(records.into_iter().map(Versioned::into_record).collect())
    }

    /// One read/compute/write cycle. A lost race surfaces as `ConcurrentModification`.
    pub async fn update_once<F>(&self, order_id: &str, mutate: &F) -> DeliveryResult<RecordChange>
    where
        F: Fn(&mut DeliveryRecord) -> DeliveryResult<()> + Send + Sync,
    {
        let Versioned { version, record } = self.load(order_id).await?;
        let mut next = record.clone();
        mutate(&mut next)?;
        let after = self.commit(order_id, version, next).await?;
        Ok(RecordChange {
            before: record,
            after,
        })
    }

    /// [`update_once`](Self::update_once) retried on lost races. Each retry re-reads, so
    /// a loser reports whatever business error the winner's write implies.
    pub async fn update<F>(
        &self,
        order_id: &str,
        max_attempts: u32,
        mutate: F,
    ) -> DeliveryResult<RecordChange>
    where
        F: Fn(&mut DeliveryRecord) -> DeliveryResult<()> + Send + Sync,
    {
        retry_on_conflict(max_attempts, || self.update_once(order_id, &mutate)).await
    }
}

/// Re-run `op` while it fails with `ConcurrentModification`, up to `max_attempts` runs.
pub async fn retry_on_conflict<T, F, Fut>(max_attempts: u32, mut op: F) -> DeliveryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DeliveryResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(DeliveryError::ConcurrentModification { order_id, .. }) => {
                if attempt >= max_attempts {
                    return Err(DeliveryError::ConcurrentModification {
                        order_id,
                        attempts: attempt,
                    });
                }
                debug!(order_id = %order_id, attempt, "conditional write lost a race, retrying");
                tokio::task::yield_now().await;
            }
            other => return other,
        }
    }
}
