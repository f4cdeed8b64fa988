//! Worker Loop
//!
//! Pops records off the dispatch queue and runs each one's status handler in
//! its own tokio task, so a slow transfer notification never holds up the
//! loop or any other key.
//!
//! ## Responsibilities
//! - **Refresh**: re-reads the record before dispatching, so a record that
//!   changed or disappeared while queued is handled in its current state.
//! - **Isolation**: handler errors and panics are caught and logged here.
//! - **Release**: the key always leaves the de-duplication set afterwards.

use super::queue::DispatchQueue;
use super::registry::StatusHandlerRegistry;
use crate::storage::types::TaskRecord;
use crate::storage::TaskStore;

use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct TaskExecutor {
    queue: Arc<DispatchQueue>,
    handlers: Arc<StatusHandlerRegistry>,
    store: Arc<dyn TaskStore>,
}

impl TaskExecutor {
    pub fn new(
        queue: Arc<DispatchQueue>,
        handlers: Arc<StatusHandlerRegistry>,
        store: Arc<dyn TaskStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            handlers,
            store,
        })
    }

    /// Spawns the worker loop. Fails if the loop was already started.
    pub fn start(self: Arc<Self>) -> Result<JoinHandle<()>> {
        let mut rx = self
            .queue
            .take_receiver()
            .ok_or_else(|| anyhow::anyhow!("Dispatch loop already started"))?;

        tracing::info!(
            "Starting dispatch loop (queue capacity {})",
            self.queue.capacity()
        );

        Ok(tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let executor = self.clone();
                tokio::spawn(async move {
                    executor.process(record).await;
                });
            }
            tracing::info!("Dispatch loop stopped");
        }))
    }

    /// Handles one dequeued record and releases its key.
    pub async fn process(&self, queued: TaskRecord) {
        let key = queued.key();

        let record = match self.store.get(&key) {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                tracing::debug!("Task {} left the store while queued", key);
                None
            }
            Err(e) => {
                tracing::error!("Cannot load task {}: {}", key, e);
                None
            }
        };

        if let Some(record) = record {
            self.run_handler(record).await;
        }

        self.queue.release(&key);
    }

    async fn run_handler(&self, record: TaskRecord) {
        let key = record.key();
        let status = record.status;

        if !self.handlers.has_handler(status) {
            tracing::trace!("No handler for {:?} task {}", status, key);
            return;
        }

        // A nested task turns a handler panic into a JoinError.
        let handlers = Arc::clone(&self.handlers);
        let outcome = tokio::spawn(async move { handlers.execute(record).await }).await;

        match outcome {
            Ok(Ok(())) => {
                tracing::debug!("Handled {:?} task {}", status, key);
            }
            Ok(Err(e)) => {
                tracing::error!("Handler for {:?} task {} failed: {:#}", status, key, e);
            }
            Err(e) if e.is_panic() => {
                tracing::error!("Handler for {:?} task {} panicked", status, key);
            }
            Err(e) => {
                tracing::error!("Handler for {:?} task {} was cancelled: {}", status, key, e);
            }
        }
    }
}
