use super::types::RelayConfig;
use crate::error::ConfigError;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How often the config file is checked for changes.
pub const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Provider of configuration snapshots.
///
/// Readers always get a complete snapshot. A reload swaps the whole `Arc`, so
/// work started under the old snapshot keeps a valid view of it.
pub trait ConfigSource: Send + Sync {
    fn current(&self) -> Arc<RelayConfig>;

    /// Receiver notified whenever a new snapshot is applied.
    fn subscribe(&self) -> watch::Receiver<Arc<RelayConfig>>;
}

/// A source whose snapshot only changes when `set` is called.
pub struct StaticConfigSource {
    tx: watch::Sender<Arc<RelayConfig>>,
}

impl StaticConfigSource {
    pub fn new(config: RelayConfig) -> Arc<Self> {
        let (tx, _rx) = watch::channel(Arc::new(config));
        Arc::new(Self { tx })
    }

    pub fn set(&self, config: RelayConfig) {
        self.tx.send_replace(Arc::new(config));
    }
}

impl ConfigSource for StaticConfigSource {
    fn current(&self) -> Arc<RelayConfig> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Arc<RelayConfig>> {
        self.tx.subscribe()
    }
}

/// Config file watched by polling its SHA-256 digest.
///
/// Before each reload attempt the last good snapshot is written next to the
/// file as `<file>.old`. If the new content fails to parse or validate, the
/// backup is copied back over the file and the active snapshot is left alone.
pub struct FileConfigSource {
    path: PathBuf,
    backup_path: PathBuf,
    tx: watch::Sender<Arc<RelayConfig>>,
    digest: Mutex<Vec<u8>>,
}

impl FileConfigSource {
    /// Loads the initial snapshot. Failing here is fatal to the caller.
    pub fn load(path: impl AsRef<Path>) -> Result<Arc<Self>, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let buf = read_file(&path)?;
        let config = RelayConfig::from_json(&buf)?;

        tracing::info!(
            "Loaded config {} with {} storage host(s)",
            path.display(),
            config.hosts.len()
        );

        let (tx, _rx) = watch::channel(Arc::new(config));
        let mut backup = path.clone().into_os_string();
        backup.push(".old");

        Ok(Arc::new(Self {
            backup_path: PathBuf::from(backup),
            path,
            tx,
            digest: Mutex::new(Sha256::digest(&buf).to_vec()),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks the file once. Returns `Ok(true)` when a new snapshot was applied.
    pub fn poll_once(&self) -> Result<bool, ConfigError> {
        let buf = read_file(&self.path)?;
        let digest = Sha256::digest(&buf).to_vec();

        {
            let mut last = self.digest.lock();
            if *last == digest {
                return Ok(false);
            }
            // Remember the candidate even if it is broken so it is reported once.
            *last = digest;
        }

        self.backup();

        let candidate = match RelayConfig::from_json(&buf) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Cannot apply config file {}: {}", self.path.display(), e);
                self.restore();
                return Err(e);
            }
        };

        if *self.tx.borrow().as_ref() == candidate {
            return Ok(false);
        }

        tracing::info!("Config reloaded, storage hosts {:?}", candidate.hosts);
        self.tx.send_replace(Arc::new(candidate));
        Ok(true)
    }

    /// Polls the file forever.
    pub async fn watch(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_once() {
                tracing::debug!("Config poll failed: {}", e);
            }
        }
    }

    fn backup(&self) {
        let current = self.current();
        let result = serde_json::to_vec_pretty(current.as_ref())
            .map_err(std::io::Error::other)
            .and_then(|bytes| std::fs::write(&self.backup_path, bytes));
        if let Err(e) = result {
            tracing::warn!(
                "Cannot back up config to {}: {}",
                self.backup_path.display(),
                e
            );
        }
    }

    fn restore(&self) {
        match std::fs::copy(&self.backup_path, &self.path) {
            Ok(_) => tracing::warn!(
                "Restored last good config over {}",
                self.path.display()
            ),
            Err(e) => tracing::error!(
                "Cannot restore config {} from {}: {}",
                self.path.display(),
                self.backup_path.display(),
                e
            ),
        }
    }
}

impl ConfigSource for FileConfigSource {
    fn current(&self) -> Arc<RelayConfig> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Arc<RelayConfig>> {
        self.tx.subscribe()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
