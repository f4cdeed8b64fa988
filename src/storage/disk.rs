use super::types::{now_ms, TaskKey, TaskRecord};
use super::{ensure_same_key, TaskStore};
use crate::error::StoreError;

use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use parking_lot::Mutex;
use std::path::Path;

const TASK_PARTITION: &str = "tasks";

/// Durable task store on top of a fjall keyspace.
///
/// Records are stored as JSON under their canonical URL. Writers are
/// serialized by a single lock, and each write is synced to disk before
/// returning.
pub struct DiskTaskStore {
    keyspace: Keyspace,
    tasks: PartitionHandle,
    write_lock: Mutex<()>,
}

impl DiskTaskStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let keyspace = fjall::Config::new(path).open()?;
        let tasks = keyspace.open_partition(TASK_PARTITION, PartitionCreateOptions::default())?;

        tracing::info!("Opened task store at {}", path.display());

        Ok(Self {
            keyspace,
            tasks,
            write_lock: Mutex::new(()),
        })
    }

    fn sync(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn read(&self, key: &TaskKey) -> Result<Option<TaskRecord>, StoreError> {
        match self.tasks.get(key.as_str())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        self.tasks.insert(record.source_url.as_str(), bytes)?;
        self.sync()
    }
}

impl TaskStore for DiskTaskStore {
    fn get(&self, key: &TaskKey) -> Result<Option<TaskRecord>, StoreError> {
        self.read(key)
    }

    fn put(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        self.write(record)
    }

    fn create(&self, record: &TaskRecord) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock();
        if self.read(&record.key())?.is_some() {
            return Ok(false);
        }
        self.write(record)?;
        Ok(true)
    }

    fn delete(&self, key: &TaskKey) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        self.tasks.remove(key.as_str())?;
        self.sync()
    }

    fn for_each(&self, f: &mut dyn FnMut(&TaskRecord)) -> Result<(), StoreError> {
        for entry in self.tasks.iter() {
            let (key, value) = entry?;
            match serde_json::from_slice::<TaskRecord>(&value) {
                Ok(record) => f(&record),
                Err(e) => {
                    // A corrupt record must not stall the sweep for every other key.
                    tracing::error!(
                        "Skipping undecodable task record {}: {}",
                        String::from_utf8_lossy(&key),
                        e
                    );
                }
            }
        }
        Ok(())
    }

    fn update(
        &self,
        key: &TaskKey,
        f: &mut dyn FnMut(&mut TaskRecord),
    ) -> Result<TaskRecord, StoreError> {
        let _guard = self.write_lock.lock();
        let mut record = self
            .read(key)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        f(&mut record);
        ensure_same_key(key, &record)?;
        record.updated_at = now_ms();

        self.write(&record)?;
        Ok(record)
    }

    fn replace(&self, old: &TaskKey, record: &TaskRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        if self.read(old)?.is_none() {
            return Err(StoreError::NotFound(old.to_string()));
        }
        if record.source_url == old.0 {
            return self.write(record);
        }

        let bytes = serde_json::to_vec(record)?;
        let mut batch = self.keyspace.batch();
        batch.remove(&self.tasks, old.as_str());
        batch.insert(&self.tasks, record.source_url.as_str(), bytes);
        batch.commit()?;

        self.sync()
    }
}
