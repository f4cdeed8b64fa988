use crate::error::ConfigError;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Address advertised to storage hosts when running in local mode.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Which host selection policy to run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SelectorPolicy {
    /// Round robin over the host list.
    #[default]
    Rotation,
    /// Host with the fewest in-flight upload notifications.
    LeastLoaded,
}

/// What the upload handler does when a host cannot be reached.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum UploadPolicy {
    /// Leave the record in `Todo`; the next reconciliation sweep retries it.
    #[default]
    Requeue,
    /// Immediately try the remaining hosts, moving the record with each attempt.
    RetryAcrossHosts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ports {
    /// Inbound API (new plot, finish and fail callbacks).
    #[serde(default = "default_control_port")]
    pub control: u16,
    /// Static server the storage hosts download plots from.
    #[serde(default = "default_file_server_port")]
    pub file_server: u16,
    /// Port the storage hosts listen on for upload notifications.
    #[serde(default = "default_storage_port")]
    pub storage: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            control: default_control_port(),
            file_server: default_file_server_port(),
            storage: default_storage_port(),
        }
    }
}

/// One fully-formed configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    pub hosts: Vec<String>,
    #[serde(default)]
    pub local_mode: bool,
    /// Address of this proxy as seen by the storage hosts.
    #[serde(default = "default_local_host")]
    pub local_host: String,
    #[serde(default)]
    pub ports: Ports,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default)]
    pub plot_paths: Vec<PathBuf>,
    #[serde(default = "default_plot_extensions")]
    pub plot_extensions: Vec<String>,
    #[serde(default)]
    pub selector: SelectorPolicy,
    #[serde(default)]
    pub upload_policy: UploadPolicy,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    #[serde(default = "default_index_interval_secs")]
    pub index_interval_secs: u64,
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
}

impl RelayConfig {
    /// Parses and validates a JSON document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: RelayConfig = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() && !self.local_mode {
            return Err(ConfigError::Invalid(
                "hosts must not be empty unless localMode is set".to_string(),
            ));
        }
        if self.hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError::Invalid("hosts contains an empty entry".to_string()));
        }
        if self.ports.control == 0 || self.ports.file_server == 0 || self.ports.storage == 0 {
            return Err(ConfigError::Invalid("ports must be non-zero".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queueCapacity must be positive".to_string()));
        }
        Ok(())
    }

    /// Address written into source and callback URLs.
    pub fn advertised_host(&self) -> &str {
        if self.local_mode {
            LOOPBACK_HOST
        } else {
            &self.local_host
        }
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    pub fn index_interval(&self) -> Duration {
        Duration::from_secs(self.index_interval_secs.max(1))
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs.max(1))
    }

    /// Minimal valid config for the given hosts. Mostly useful in tests.
    pub fn with_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            local_mode: false,
            local_host: default_local_host(),
            ports: Ports::default(),
            db_path: default_db_path(),
            plot_paths: Vec::new(),
            plot_extensions: default_plot_extensions(),
            selector: SelectorPolicy::default(),
            upload_policy: UploadPolicy::default(),
            queue_capacity: default_queue_capacity(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            index_interval_secs: default_index_interval_secs(),
            upload_timeout_secs: default_upload_timeout_secs(),
        }
    }
}

fn default_control_port() -> u16 {
    18180
}

fn default_file_server_port() -> u16 {
    18181
}

fn default_storage_port() -> u16 {
    18080
}

fn default_local_host() -> String {
    LOOPBACK_HOST.to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/plot-relay/tasks")
}

fn default_plot_extensions() -> Vec<String> {
    vec!["plot".to_string()]
}

fn default_queue_capacity() -> usize {
    256
}

fn default_reconcile_interval_secs() -> u64 {
    10
}

fn default_index_interval_secs() -> u64 {
    60
}

fn default_upload_timeout_secs() -> u64 {
    30
}
