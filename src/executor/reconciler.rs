//! Reconciliation Loader
//!
//! Periodically walks the whole task store and queues every record that is
//! neither terminal nor already in flight. This is how records written
//! straight into the store (indexer, callbacks) reach their handlers, and how
//! work resumes after a restart, when the queue starts out empty.

use super::queue::DispatchQueue;
use crate::error::StoreError;
use crate::storage::types::TaskRecord;
use crate::storage::TaskStore;

use std::sync::Arc;
use std::time::Duration;

pub struct ReconciliationLoader {
    store: Arc<dyn TaskStore>,
    queue: Arc<DispatchQueue>,
    interval: Duration,
}

impl ReconciliationLoader {
    pub fn new(store: Arc<dyn TaskStore>, queue: Arc<DispatchQueue>, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            store,
            queue,
            interval,
        })
    }

    /// One full scan of the store. Returns how many records were queued.
    pub async fn sweep(&self) -> Result<usize, StoreError> {
        let mut candidates: Vec<TaskRecord> = Vec::new();
        self.store.for_each(&mut |record: &TaskRecord| {
            // The in-flight set, not the stored status, decides whether a
            // handler still owns the key.
            if !record.status.is_terminal() && !self.queue.is_in_flight(&record.key()) {
                candidates.push(record.clone());
            }
        })?;

        let mut queued = 0;
        for record in candidates {
            if self.queue.enqueue(record).await {
                queued += 1;
            }
        }

        Ok(queued)
    }

    pub async fn run(self: Arc<Self>) {
        tracing::info!("Reconciliation every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            ticker.tick().await;

            match self.sweep().await {
                Ok(0) => tracing::trace!("Reconciliation sweep found nothing to queue"),
                Ok(n) => tracing::debug!("Reconciliation sweep queued {} task(s)", n),
                Err(e) => tracing::error!("Reconciliation sweep failed: {}", e),
            }
        }
    }
}
