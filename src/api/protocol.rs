//! Network Protocol Definitions
//!
//! Endpoints and DTOs exchanged with the plotter (new plot directories) and
//! with the storage hosts (upload notifications and their callbacks).

use crate::storage::types::TaskRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// --- Inbound (control port) ---

/// Plotter announces a directory with finished plots.
pub const ENDPOINT_NEW_PLOT: &str = "/api/v1/plot/new";
/// Storage host finished downloading a plot.
pub const ENDPOINT_FINISH_PLOT: &str = "/api/v1/plot/finish";
/// Storage host gave up on a plot.
pub const ENDPOINT_FAIL_PLOT: &str = "/api/v1/plot/fail";
/// Snapshot of every task in the store.
pub const ENDPOINT_TASKS: &str = "/api/v1/tasks";

// --- Outbound ---

/// Upload notification endpoint on each storage host.
pub const ENDPOINT_UPLOAD_PLOT: &str = "/api/v1/plot/upload";

/// URL prefix of the static file server.
pub const PLOT_FILE_PREFIX: &str = "/plotfile";

#[derive(Debug, Serialize, Deserialize)]
pub struct NewPlotRequest {
    pub plot_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewPlotResponse {
    /// Files accepted from the directory, `0` on failure.
    pub processed: usize,
    pub error: Option<String>,
}

/// Body of both the finish and the fail callback.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlotCallbackRequest {
    /// Canonical URL of the plot, i.e. the task key.
    pub plot_file: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskRecord>,
}

/// Sent to a storage host to make it fetch a plot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadPlotRequest {
    pub plot_url: String,
    pub finish_url: String,
    pub fail_url: String,
}

impl From<&TaskRecord> for UploadPlotRequest {
    fn from(record: &TaskRecord) -> Self {
        Self {
            plot_url: record.source_url.clone(),
            finish_url: record.finish_url.clone(),
            fail_url: record.fail_url.clone(),
        }
    }
}
