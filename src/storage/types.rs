use crate::api::protocol::{ENDPOINT_FAIL_PLOT, ENDPOINT_FINISH_PLOT, PLOT_FILE_PREFIX};
use crate::config::types::RelayConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier of a task in the store.
///
/// Always the canonical URL at which the remote host fetches the file. The
/// URL carries the assigned host, so reassigning a task changes its key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey(pub String);

impl TaskKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Delivery state of a plot file.
///
/// `Todo -> Wait -> Finish -> Done`, with `Err` as a transient marker that the
/// fail handler turns into a fresh `Todo` record bound to another host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Discovered, not yet offered to a host.
    Todo,
    /// Host accepted the upload notification and is fetching the file.
    Wait,
    /// Host confirmed the transfer; local file pending deletion.
    Finish,
    /// Terminal. Never re-enters the dispatch queue.
    Done,
    /// Host reported a failed transfer; must move to another host.
    Err,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

/// The persisted unit of work for one plot file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub status: TaskStatus,
    /// Storage host currently assigned to this task.
    pub host: String,
    /// Where the host fetches the file. Doubles as the task key.
    pub source_url: String,
    pub finish_url: String,
    pub fail_url: String,
    /// Local file backing `source_url`.
    pub path: PathBuf,
    pub created_at: u64,
    pub updated_at: u64,
}

impl TaskRecord {
    /// Builds a fresh `Todo` record for `path`, bound to `host`.
    pub fn new_todo(config: &RelayConfig, path: &Path, host: &str) -> Self {
        let now = now_ms();
        Self {
            status: TaskStatus::Todo,
            host: host.to_string(),
            source_url: source_url(config, path, host),
            finish_url: callback_url(config, ENDPOINT_FINISH_PLOT),
            fail_url: callback_url(config, ENDPOINT_FAIL_PLOT),
            path: path.to_path_buf(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> TaskKey {
        TaskKey(self.source_url.clone())
    }

    /// Replacement record for the same file on another host.
    ///
    /// The result has a new key; the caller swaps it in with
    /// `TaskStore::replace`.
    pub fn reassigned(&self, config: &RelayConfig, host: &str) -> Self {
        let mut next = Self::new_todo(config, &self.path, host);
        next.created_at = self.created_at;
        next
    }
}

/// `http://<local>:<file port>/plotfile/<path>?dest=<host>`
///
/// Each path segment is percent-encoded; the file server decodes them again.
pub fn source_url(config: &RelayConfig, path: &Path, host: &str) -> String {
    let display = path.to_string_lossy();
    let file = display
        .trim_start_matches('/')
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/");
    format!(
        "http://{}:{}{}/{}?dest={}",
        config.advertised_host(),
        config.ports.file_server,
        PLOT_FILE_PREFIX,
        file,
        urlencoding::encode(host)
    )
}

pub fn callback_url(config: &RelayConfig, endpoint: &str) -> String {
    format!(
        "http://{}:{}{}",
        config.advertised_host(),
        config.ports.control,
        endpoint
    )
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
