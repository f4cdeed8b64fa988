//! Status Handlers
//!
//! One handler per actionable status. Each performs a single externally
//! visible action and writes the resulting status back to the store:
//!
//! - **Upload** (`Todo`): notifies the assigned host, then `Todo -> Wait`.
//! - **Finish** (`Finish`): deletes the local plot, then `Done` and purge.
//! - **Fail** (`Err`): picks another host and replaces the record with a
//!   fresh `Todo` one under the new host's key.
//!
//! Store errors propagate to the worker loop, which logs them; the record is
//! picked up again by the next reconciliation sweep. Transport errors are
//! handled here according to the configured `UploadPolicy`.

use super::queue::DispatchQueue;
use super::registry::StatusHandlerRegistry;
use crate::api::client::StorageClient;
use crate::api::protocol::UploadPlotRequest;
use crate::config::{ConfigSource, RelayConfig, UploadPolicy};
use crate::error::{FilesystemError, TransportError};
use crate::placement::{assign_host, HostSelector};
use crate::storage::types::{TaskRecord, TaskStatus};
use crate::storage::TaskStore;

use anyhow::Result;
use std::sync::Arc;

pub struct Transitions {
    store: Arc<dyn TaskStore>,
    queue: Arc<DispatchQueue>,
    selector: Arc<dyn HostSelector>,
    client: Arc<dyn StorageClient>,
    config: Arc<dyn ConfigSource>,
}

impl Transitions {
    pub fn new(
        store: Arc<dyn TaskStore>,
        queue: Arc<DispatchQueue>,
        selector: Arc<dyn HostSelector>,
        client: Arc<dyn StorageClient>,
        config: Arc<dyn ConfigSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            queue,
            selector,
            client,
            config,
        })
    }

    /// Binds the upload, finish and fail handlers.
    pub fn register(self: &Arc<Self>, registry: &StatusHandlerRegistry) {
        let this = Arc::clone(self);
        registry.register(TaskStatus::Todo, move |record| {
            let this = Arc::clone(&this);
            async move { this.upload(record).await }
        });

        let this = Arc::clone(self);
        registry.register(TaskStatus::Finish, move |record| {
            let this = Arc::clone(&this);
            async move { this.finish(record).await }
        });

        let this = Arc::clone(self);
        registry.register(TaskStatus::Err, move |record| {
            let this = Arc::clone(&this);
            async move { this.fail(record).await }
        });
    }

    /// Notifies `record.host` about the plot.
    pub async fn upload(&self, record: TaskRecord) -> Result<()> {
        if record.status != TaskStatus::Todo {
            return Ok(());
        }

        let config = self.config.current();
        tracing::info!("Try to serve {} -> {}", record.source_url, record.host);

        match self.notify(&record.host, &record).await {
            Ok(()) => {
                self.mark_waiting(&record)?;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Fail to notify new plot -> {}: {}", record.host, e);
                match config.upload_policy {
                    // Still `Todo`: the next sweep offers it again.
                    UploadPolicy::Requeue => Ok(()),
                    UploadPolicy::RetryAcrossHosts => self.retry_across_hosts(record, &config).await,
                }
            }
        }
    }

    /// Deletes the delivered plot and retires its record.
    pub async fn finish(&self, record: TaskRecord) -> Result<()> {
        if record.status != TaskStatus::Finish {
            return Ok(());
        }

        match tokio::fs::remove_file(&record.path).await {
            Ok(()) => tracing::info!("Removed finished plot file {}", record.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Plot file {} already removed", record.path.display());
            }
            Err(source) => {
                return Err(FilesystemError::Io {
                    path: record.path.clone(),
                    source,
                }
                .into());
            }
        }

        let key = record.key();
        self.store.update(&key, &mut |r: &mut TaskRecord| r.status = TaskStatus::Done)?;
        self.store.delete(&key)?;

        tracing::info!("Task {} done", key);
        Ok(())
    }

    /// Moves a failed plot to another host under a new key.
    pub async fn fail(&self, record: TaskRecord) -> Result<()> {
        if record.status != TaskStatus::Err {
            return Ok(());
        }

        let config = self.config.current();
        let lease = assign_host(self.selector.as_ref(), &config, &[record.host.as_str()])
            .ok_or(TransportError::NoHost)?;

        let next = record.reassigned(&config, lease.host());
        self.store.replace(&record.key(), &next)?;

        tracing::info!(
            "Reassigned {} from {} to {}",
            record.path.display(),
            record.host,
            next.host
        );
        Ok(())
    }

    /// Tries every other host right away, moving the record along with each
    /// attempt. Gives up after one lap around the pool.
    async fn retry_across_hosts(&self, record: TaskRecord, config: &RelayConfig) -> Result<()> {
        let pool_size = self.selector.hosts().len();
        let mut tried = vec![record.host.clone()];
        let mut current = record;

        for _ in 1..pool_size {
            let exclude: Vec<&str> = tried.iter().map(String::as_str).collect();
            let Some(lease) = assign_host(self.selector.as_ref(), config, &exclude) else {
                break;
            };
            // Only falls back to a tried host once every host was tried.
            if tried.iter().any(|h| h == lease.host()) {
                break;
            }
            tried.push(lease.host().to_string());

            let candidate = current.reassigned(config, lease.host());
            // Keep the reconciler off the new key while this handler owns it.
            let Some(_claim) = self.queue.claim(&candidate.key()) else {
                continue;
            };
            self.store.replace(&current.key(), &candidate)?;
            drop(lease);
            current = candidate;

            tracing::info!("Try to serve {} -> {}", current.source_url, current.host);
            match self.notify(&current.host, &current).await {
                Ok(()) => {
                    self.mark_waiting(&current)?;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Fail to notify new plot -> {}: {}", current.host, e);
                }
            }
        }

        tracing::warn!(
            "No host accepted {}, leaving it for the next sweep",
            current.path.display()
        );
        Ok(())
    }

    async fn notify(&self, host: &str, record: &TaskRecord) -> Result<(), TransportError> {
        let _lease = self.selector.lease_for(host);
        self.client
            .upload_plot(host, &UploadPlotRequest::from(record))
            .await
    }

    /// `Todo -> Wait`, leaving any status a callback already wrote alone.
    fn mark_waiting(&self, record: &TaskRecord) -> Result<()> {
        let updated = self.store.update(&record.key(), &mut |r: &mut TaskRecord| {
            if r.status == TaskStatus::Todo {
                r.status = TaskStatus::Wait;
            }
        })?;
        tracing::info!("Task {} is {:?} on {}", updated.source_url, updated.status, updated.host);
        Ok(())
    }
}
