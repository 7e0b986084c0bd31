//! In-memory [`RecordStore`] adapter.
//!
//! Backed by a [`DashMap`], whose entry guards give per-key atomicity for the
//! compare-and-swap in `conditional_update`. Suitable for tests, local simulation and
//! single-process deployments; multi-instance deployments plug a shared store in behind
//! the same trait.

use super::{RecordMutator, RecordStore, StoreError, StoreResult, StoredRecord, Versioned};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Clone)]
pub struct InMemoryRecordStore<R: StoredRecord> {
    records: Arc<DashMap<String, Versioned<R>>>,
}

impl<R: StoredRecord> InMemoryRecordStore<R> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R: StoredRecord> Default for InMemoryRecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: StoredRecord> RecordStore<R> for InMemoryRecordStore<R> {
    async fn create_if_absent(&self, key: &str, record: R) -> StoreResult<Versioned<R>> {
        match self.records.entry(key.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                key: key.to_string(),
            }),
            Entry::Vacant(slot) => {
                let versioned = Versioned { version: 1, record };
                slot.insert(versioned.clone());
                debug!(key, "record created");
                Ok(versioned)
            }
        }
    }

    async fn get_by_key(&self, key: &str) -> StoreResult<Option<Versioned<R>>> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn conditional_update(
        &self,
        key: &str,
        expected_version: u64,
        mutator: RecordMutator<R>,
    ) -> StoreResult<Versioned<R>> {
        let mut entry = self
            .records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;

        let current = entry.value_mut();
        if current.version != expected_version {
            trace!(
                key,
                expected_version,
                actual = current.version,
                "conditional update rejected"
            );
            return Err(StoreError::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                actual: current.version,
            });
        }

        mutator(&mut current.record);
        current.version += 1;
        debug!(key, version = current.version, "record updated");
        Ok(current.clone())
    }

    async fn query_by_index(
        &self,
        index_name: &str,
        value: &str,
    ) -> StoreResult<Vec<Versioned<R>>> {
        let matches = self
            .records
            .iter()
            .filter(|entry| entry.value().record.index_value(index_name).as_deref() == Some(value))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(matches)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.records.remove(key).is_some())
    }

    async fn delete_if_version(&self, key: &str, expected_version: u64) -> StoreResult<bool> {
        let removed = self
            .records
            .remove_if(key, |_, current| current.version == expected_version)
            .is_some();
        trace!(key, expected_version, removed, "conditional delete");
        Ok(removed)
    }
}
