//! Error taxonomy.
//!
//! Each subsystem reports through its own enum so callers can tell a
//! recoverable transport hiccup from a store failure that abandons the task
//! until the next reconciliation sweep.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the durable task store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(String),

    #[error("task {0} already exists")]
    AlreadyExists(String),

    #[error("failed to encode or decode task record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<fjall::Error> for StoreError {
    fn from(e: fjall::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Failures talking to a remote storage host.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {host} failed: {source}")]
    Request {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("host {host} rejected upload notification with status {status}")]
    Rejected { host: String, status: u16 },

    #[error("no storage host available")]
    NoHost,
}

/// Failures loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures surfaced to callers registering plot directories.
#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("path {0} does not exist")]
    NotFound(PathBuf),

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot find suitable plot file in {0}")]
    NoEligibleFiles(PathBuf),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}
