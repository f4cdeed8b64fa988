//! Configuration
//!
//! The proxy reads a JSON document naming the storage host pool, the ports it
//! listens on and the plot directories it watches. The document can be edited
//! while the daemon runs.
//!
//! ## Reload model
//! - **Snapshots**: consumers hold an `Arc<RelayConfig>`; a reload publishes a
//!   new `Arc` through a `watch` channel and never mutates the old one.
//! - **Polling**: `FileConfigSource` hashes the file every few seconds and
//!   only parses it when the digest changes.
//! - **Backup and restore**: a malformed candidate is discarded and the last
//!   good snapshot is written back over the file.

pub mod source;
pub mod types;


pub use source::{ConfigSource, FileConfigSource, StaticConfigSource};
pub use types::{Ports, RelayConfig, SelectorPolicy, UploadPolicy};
