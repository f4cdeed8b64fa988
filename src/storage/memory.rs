use super::types::{now_ms, TaskKey, TaskRecord};
use super::{ensure_same_key, TaskStore};
use crate::error::StoreError;

use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory task store.
///
/// Keeps records in key order so iteration matches the disk store. Nothing
/// survives a restart.
#[derive(Default)]
pub struct MemoryTaskStore {
    records: RwLock<BTreeMap<TaskKey, TaskRecord>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl TaskStore for MemoryTaskStore {
    fn get(&self, key: &TaskKey) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.records.read().get(key).cloned())
    }

    fn put(&self, record: &TaskRecord) -> Result<(), StoreError> {
        self.records.write().insert(record.key(), record.clone());
        Ok(())
    }

    fn create(&self, record: &TaskRecord) -> Result<bool, StoreError> {
        let mut records = self.records.write();
        let key = record.key();
        if records.contains_key(&key) {
            return Ok(false);
        }
        records.insert(key, record.clone());
        Ok(true)
    }

    fn delete(&self, key: &TaskKey) -> Result<(), StoreError> {
        self.records.write().remove(key);
        Ok(())
    }

    fn for_each(&self, f: &mut dyn FnMut(&TaskRecord)) -> Result<(), StoreError> {
        // Snapshot first so callbacks may write back into the store.
        let snapshot: Vec<TaskRecord> = self.records.read().values().cloned().collect();
        for record in &snapshot {
            f(record);
        }
        Ok(())
    }

    fn update(
        &self,
        key: &TaskKey,
        f: &mut dyn FnMut(&mut TaskRecord),
    ) -> Result<TaskRecord, StoreError> {
        let mut records = self.records.write();
        let current = records
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let mut next = current.clone();
        f(&mut next);
        ensure_same_key(key, &next)?;
        next.updated_at = now_ms();

        records.insert(key.clone(), next.clone());
        Ok(next)
    }

    fn replace(&self, old: &TaskKey, record: &TaskRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if records.remove(old).is_none() {
            return Err(StoreError::NotFound(old.to_string()));
        }
        records.insert(record.key(), record.clone());
        Ok(())
    }
}
