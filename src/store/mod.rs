//! # Durable Record Store Port
//!
//! Keyed persistence for delivery records and subscriber connections. The core only
//! relies on the primitives declared by [`RecordStore`]: idempotent create, keyed read
//! with read-after-write consistency, conditional update guarded by a version, and a
//! secondary-index query. Any storage engine that offers those can back the core.
//!
//! The conditional update is the single correctness boundary for concurrent writers:
//! callers read a [`Versioned`] record, compute the next state, and write it back only
//! if the version is still the one they read.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryRecordStore;

/// A record that can be kept in a [`RecordStore`].
pub trait StoredRecord: Clone + Send + Sync + 'static {
    /// Primary key of the record.
    fn key(&self) -> &str;

    /// Value of the named secondary index for this record, if it participates in it.
    fn index_value(&self, index_name: &str) -> Option<String>;
}

/// A record together with the version the store assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<R> {
    pub version: u64,
    pub record: R,
}

impl<R> Versioned<R> {
    pub fn into_record(self) -> R {
        self.record
    }
}

/// Mutation applied by the store under its own per-key atomicity.
pub type RecordMutator<R> = Box<dyn FnOnce(&mut R) + Send>;

/// Errors surfaced by store adapters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Record {key} already exists")]
    AlreadyExists { key: String },

    #[error("Record {key} not found")]
    NotFound { key: String },

    #[error("Version conflict on {key}: expected {expected}, found {actual}")]
    VersionConflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable keyed persistence with optimistic concurrency.
#[async_trait]
pub trait RecordStore<R: StoredRecord>: Send + Sync {
    /// Insert `record` under `key` unless a record already exists there.
    async fn create_if_absent(&self, key: &str, record: R) -> StoreResult<Versioned<R>>;

    /// Read the latest committed version of `key`.
    async fn get_by_key(&self, key: &str) -> StoreResult<Option<Versioned<R>>>;

    /// Apply `mutator` to the record at `key` iff its version equals `expected_version`.
    ///
    /// On success the version is incremented and the new envelope returned.
    async fn conditional_update(
        &self,
        key: &str,
        expected_version: u64,
        mutator: RecordMutator<R>,
    ) -> StoreResult<Versioned<R>>;

    /// All records whose `index_name` value equals `value`, as a point-in-time snapshot.
    async fn query_by_index(&self, index_name: &str, value: &str)
        -> StoreResult<Vec<Versioned<R>>>;

    /// Remove `key`. Returns whether a record was present.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Remove `key` only while its version is still `expected_version`.
    ///
    /// Returns `false` when the record is absent or has moved on.
    async fn delete_if_version(&self, key: &str, expected_version: u64) -> StoreResult<bool>;
}
