//! Relay Engine
//!
//! Owns one instance of every component and wires them together. Built once
//! at startup and handed to whatever needs it; nothing here is global.

use crate::api::client::{HttpStorageClient, StorageClient};
use crate::api::{control_router, file_router};
use crate::config::ConfigSource;
use crate::error::RelayError;
use crate::executor::{
    DispatchQueue, ReconciliationLoader, StatusHandlerRegistry, TaskExecutor, Transitions,
};
use crate::indexer::Indexer;
use crate::placement::{build_selector, HostSelector};
use crate::storage::disk::DiskTaskStore;
use crate::storage::TaskStore;

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct RelayEngine {
    pub config: Arc<dyn ConfigSource>,
    pub store: Arc<dyn TaskStore>,
    pub queue: Arc<DispatchQueue>,
    pub selector: Arc<dyn HostSelector>,
    pub handlers: Arc<StatusHandlerRegistry>,
    pub executor: Arc<TaskExecutor>,
    pub reconciler: Arc<ReconciliationLoader>,
    pub indexer: Arc<Indexer>,
}

impl RelayEngine {
    /// Opens the on-disk task store and builds the HTTP storage client from
    /// the current config snapshot.
    pub fn open(config: Arc<dyn ConfigSource>) -> Result<Arc<Self>, RelayError> {
        let snapshot = config.current();
        tracing::info!("Opening task store at {}", snapshot.db_path.display());

        let store: Arc<dyn TaskStore> = Arc::new(DiskTaskStore::open(&snapshot.db_path)?);
        let client: Arc<dyn StorageClient> = Arc::new(HttpStorageClient::new(
            snapshot.ports.storage,
            snapshot.upload_timeout(),
        ));

        Ok(Self::with_parts(config, store, client))
    }

    /// Builds the engine around an existing store and client.
    pub fn with_parts(
        config: Arc<dyn ConfigSource>,
        store: Arc<dyn TaskStore>,
        client: Arc<dyn StorageClient>,
    ) -> Arc<Self> {
        let snapshot = config.current();

        let queue = DispatchQueue::new(snapshot.queue_capacity);
        let selector = build_selector(snapshot.selector, &snapshot.hosts);

        let handlers = StatusHandlerRegistry::new();
        let transitions = Transitions::new(
            store.clone(),
            queue.clone(),
            selector.clone(),
            client,
            config.clone(),
        );
        transitions.register(&handlers);

        let executor = TaskExecutor::new(queue.clone(), handlers.clone(), store.clone());
        let reconciler = ReconciliationLoader::new(
            store.clone(),
            queue.clone(),
            snapshot.reconcile_interval(),
        );
        let indexer = Indexer::new(store.clone(), selector.clone(), config.clone());

        Arc::new(Self {
            config,
            store,
            queue,
            selector,
            handlers,
            executor,
            reconciler,
            indexer,
        })
    }

    /// Spawns the dispatch loop, the reconciliation sweep, the indexer and the
    /// host pool follower.
    pub fn start(&self) -> Result<Vec<JoinHandle<()>>> {
        let mut tasks = vec![self.executor.clone().start()?];

        tasks.push(tokio::spawn(self.reconciler.clone().run()));
        tasks.push(tokio::spawn(self.indexer.clone().run()));
        tasks.push(self.follow_host_pool());

        tracing::info!(
            "Relay engine started with {} handler(s)",
            self.handlers.handler_count()
        );
        Ok(tasks)
    }

    /// Router for the control port.
    pub fn control_router(&self) -> Router {
        control_router(self.store.clone(), self.queue.clone(), self.indexer.clone())
    }

    /// Router for the file server port.
    pub fn file_router(&self) -> Router {
        file_router()
    }

    /// Applies the host list of every new config snapshot to the selector.
    fn follow_host_pool(&self) -> JoinHandle<()> {
        let mut rx = self.config.subscribe();
        let selector = self.selector.clone();
        let policy = self.config.current().selector;

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let config = rx.borrow_and_update().clone();
                if config.selector != policy {
                    tracing::warn!(
                        "Selector policy change to {:?} takes effect after restart",
                        config.selector
                    );
                }
                selector.replace_pool(&config.hosts);
                tracing::info!("Host pool is now {:?}", selector.hosts());
            }
        })
    }
}
