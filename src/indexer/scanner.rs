use crate::error::FilesystemError;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Marker the plotter keeps inside a plot directory.
pub const PROGRESS_FILE: &str = "progress.json";

/// Contents of `progress.json`.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct Progress {
    #[serde(default)]
    pub file_index: u64,
    #[serde(default, rename = "complete")]
    pub completed: bool,
}

/// Reads the progress marker. A missing marker means "still plotting".
pub fn read_progress(dir: &Path) -> Result<Progress, FilesystemError> {
    let path = dir.join(PROGRESS_FILE);
    match std::fs::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| FilesystemError::Io {
            path,
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Progress::default()),
        Err(source) => Err(FilesystemError::Io { path, source }),
    }
}

/// Non-empty files under `dir` whose extension is one of `extensions`.
///
/// `max_depth` of 1 lists only the directory itself.
pub fn plot_files(dir: &Path, extensions: &[String], max_depth: usize) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry under {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name() != PROGRESS_FILE)
        .filter(|entry| has_extension(entry.path(), extensions))
        .filter(|entry| entry.metadata().map(|m| m.len() > 0).unwrap_or(false))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Every directory below `root`, excluding `root` itself.
pub fn subdirectories(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}
