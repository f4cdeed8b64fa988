//! Task Store
//!
//! Durable mapping from task key (the canonical plot URL) to its `TaskRecord`.
//! The store is the single source of truth for delivery state: the dispatch
//! queue and its de-duplication set are rebuilt from it after every restart.
//!
//! ## Guarantees
//! - **One record per key**: `create` refuses to overwrite, `replace` swaps a
//!   record to a new key in a single commit.
//! - **Atomic updates**: `update` is a read-modify-write under the store's
//!   writer lock; readers never observe a half-written record.
//! - **Durability**: every successful write is synced before the call returns.
//!
//! ## Submodules
//! - **`types`**: `TaskKey`, `TaskStatus`, `TaskRecord` and URL construction.
//! - **`memory`**: ordered in-memory store, used by tests and ephemeral runs.
//! - **`disk`**: fjall-backed store used by the daemon.

pub mod disk;
pub mod memory;
pub mod types;


use crate::error::StoreError;
use types::{TaskKey, TaskRecord};

/// Contract shared by every task store backend.
///
/// All operations are safe under concurrent callers. Backends may serialize
/// writers globally.
pub trait TaskStore: Send + Sync {
    fn get(&self, key: &TaskKey) -> Result<Option<TaskRecord>, StoreError>;

    /// Inserts or overwrites the record under `record.key()`.
    fn put(&self, record: &TaskRecord) -> Result<(), StoreError>;

    /// Inserts the record only if its key is absent. Returns `false` when a
    /// record already exists.
    fn create(&self, record: &TaskRecord) -> Result<bool, StoreError>;

    fn delete(&self, key: &TaskKey) -> Result<(), StoreError>;

    /// Visits every record in key order.
    fn for_each(&self, f: &mut dyn FnMut(&TaskRecord)) -> Result<(), StoreError>;

    /// Atomic read-modify-write. Fails with `NotFound` if the key is absent.
    ///
    /// `f` must not change the record key; use `replace` for that.
    fn update(
        &self,
        key: &TaskKey,
        f: &mut dyn FnMut(&mut TaskRecord),
    ) -> Result<TaskRecord, StoreError>;

    /// Deletes `old` and inserts `record` under its own key in one commit.
    /// Fails with `NotFound` if `old` is absent.
    fn replace(&self, old: &TaskKey, record: &TaskRecord) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<TaskRecord>, StoreError> {
        let mut records = Vec::new();
        self.for_each(&mut |record: &TaskRecord| records.push(record.clone()))?;
        Ok(records)
    }
}

pub(crate) fn ensure_same_key(key: &TaskKey, record: &TaskRecord) -> Result<(), StoreError> {
    if record.source_url != key.0 {
        return Err(StoreError::Backend(format!(
            "update of {} attempted to change the key to {}",
            key, record.source_url
        )));
    }
    Ok(())
}
