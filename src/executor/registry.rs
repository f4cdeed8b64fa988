//! Status Handler Registry
//!
//! Maps a `TaskStatus` to the async function that advances records in that
//! status. The worker loop stays generic; the lifecycle lives in whatever is
//! registered here.

use crate::storage::types::{TaskRecord, TaskStatus};

use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for a thread-safe, asynchronous status handler.
pub type StatusHandlerFn =
    Arc<dyn Fn(TaskRecord) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

#[derive(Default)]
pub struct StatusHandlerRegistry {
    handlers: DashMap<TaskStatus, StatusHandlerFn>,
}

impl StatusHandlerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Binds `handler` to `status`, replacing any previous binding.
    pub fn register<F, Fut>(&self, status: TaskStatus, handler: F)
    where
        F: Fn(TaskRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        // Type-erase the future so different async fns share one map.
        let handler_fn: StatusHandlerFn = Arc::new(move |record: TaskRecord| {
            Box::pin(handler(record)) as Pin<Box<dyn Future<Output = Result<()>> + Send>>
        });

        self.handlers.insert(status, handler_fn);

        tracing::info!("Registered handler for {:?} tasks", status);
    }

    /// Runs the handler bound to the record's status.
    ///
    /// # Returns
    /// * `Ok(())` if the handler succeeded.
    /// * `Err` if the handler failed or nothing is bound to the status.
    pub async fn execute(&self, record: TaskRecord) -> Result<()> {
        // Clone the Arc out so no map guard is held across the await.
        let handler_fn = self
            .handlers
            .get(&record.status)
            .map(|entry| Arc::clone(entry.value()));

        match handler_fn {
            Some(handler_fn) => handler_fn(record).await,
            None => Err(anyhow::anyhow!(
                "No handler registered for {:?} tasks",
                record.status
            )),
        }
    }

    pub fn has_handler(&self, status: TaskStatus) -> bool {
        self.handlers.contains_key(&status)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}
