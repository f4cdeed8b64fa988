//! Plot Relay Library
//!
//! Storage proxy that hands finished plot files to a pool of remote storage
//! hosts and tracks every file until the host confirms receipt and the local
//! copy is gone.
//!
//! ## Architecture Modules
//! - **`storage`**: durable task store, one record per plot file, keyed by
//!   the URL the remote host fetches it from.
//! - **`executor`**: bounded dispatch queue, worker loop, per-status handlers
//!   and the reconciliation sweep that rebuilds the queue from the store.
//! - **`placement`**: host selection (rotation or least loaded).
//! - **`indexer`**: discovers plot files on disk and removes delivered
//!   directories.
//! - **`config`**: JSON config snapshots with polling reload.
//! - **`api`**: inbound HTTP handlers, file server and outbound client.
//! - **`engine`**: builds and starts all of the above.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod indexer;
pub mod placement;
pub mod storage;
