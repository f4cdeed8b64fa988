use super::scanner::{plot_files, read_progress, subdirectories};
use crate::config::{ConfigSource, RelayConfig};
use crate::error::{FilesystemError, RelayError, StoreError, TransportError};
use crate::placement::{assign_host, HostSelector};
use crate::storage::types::{TaskRecord, TaskStatus};
use crate::storage::TaskStore;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of indexing one plot directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectoryReport {
    /// Records created during this pass.
    pub created: usize,
    /// Files whose record is not `Done` yet.
    pub pending: usize,
    /// The directory was complete and fully delivered, and has been deleted.
    pub removed: bool,
}

pub struct Indexer {
    store: Arc<dyn TaskStore>,
    selector: Arc<dyn HostSelector>,
    config: Arc<dyn ConfigSource>,
    /// Held from the path snapshot until its records are written, so two
    /// passes over one directory never both create a task for a file.
    placing: Mutex<()>,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn TaskStore>,
        selector: Arc<dyn HostSelector>,
        config: Arc<dyn ConfigSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            selector,
            config,
            placing: Mutex::new(()),
        })
    }

    /// Registers every eligible file below `dir` as a `Todo` task, all on
    /// one host.
    ///
    /// Returns how many eligible files were found. Files that already have a
    /// task are counted but left untouched.
    pub async fn register_directory(&self, dir: &Path) -> Result<usize, RelayError> {
        check_directory(dir).await?;

        let config = self.config.current();
        let _placing = self.placing.lock().await;
        let files = walk(dir.to_path_buf(), config.plot_extensions.clone(), usize::MAX).await?;
        if files.is_empty() {
            return Err(FilesystemError::NoEligibleFiles(dir.to_path_buf()).into());
        }

        let mut known = self.records_by_path()?;
        let created = self.place_files(&config, dir, &files, &mut known)?;

        tracing::info!(
            "Registered {}: {} plot file(s), {} new",
            dir.display(),
            files.len(),
            created
        );
        Ok(files.len())
    }

    /// Indexes every directory below each configured plot path.
    pub async fn index_all(&self) {
        let config = self.config.current();
        for root in &config.plot_paths {
            if let Err(e) = self.index_root(root).await {
                tracing::error!("Fail to index {}: {}", root.display(), e);
            }
        }
    }

    pub async fn index_root(&self, root: &Path) -> Result<(), RelayError> {
        check_directory(root).await?;

        let root_buf = root.to_path_buf();
        let dirs = tokio::task::spawn_blocking(move || subdirectories(&root_buf))
            .await
            .map_err(|e| join_error(root, e))?;

        let _placing = self.placing.lock().await;
        let mut known = self.records_by_path()?;
        for dir in dirs {
            tracing::debug!("Index {} in {}", dir.display(), root.display());
            if let Err(e) = self.index_directory_with(&dir, &mut known).await {
                tracing::error!("Fail to index {}: {}", dir.display(), e);
            }
        }
        Ok(())
    }

    /// Creates tasks for new files in `dir` and deletes the directory once the
    /// plotter marked it complete and every file in it is delivered.
    pub async fn index_directory(&self, dir: &Path) -> Result<DirectoryReport, RelayError> {
        let _placing = self.placing.lock().await;
        let mut known = self.records_by_path()?;
        self.index_directory_with(dir, &mut known).await
    }

    async fn index_directory_with(
        &self,
        dir: &Path,
        known: &mut HashMap<PathBuf, TaskRecord>,
    ) -> Result<DirectoryReport, RelayError> {
        let config = self.config.current();
        let progress = read_progress(dir)?;
        let files = walk(dir.to_path_buf(), config.plot_extensions.clone(), usize::MAX).await?;

        let mut report = DirectoryReport {
            created: self.place_files(&config, dir, &files, known)?,
            ..DirectoryReport::default()
        };

        report.pending = files
            .iter()
            .filter(|file| {
                known
                    .get(*file)
                    .map(|record| record.status != TaskStatus::Done)
                    .unwrap_or(true)
            })
            .count();

        if !progress.completed {
            return Ok(report);
        }
        if report.pending > 0 {
            tracing::info!(
                "{} plot completed but still fetching {} file(s)",
                dir.display(),
                report.pending
            );
            return Ok(report);
        }

        tracing::info!("Path {} transfer done, try to remove it", dir.display());
        tokio::fs::remove_dir_all(dir)
            .await
            .map_err(|source| FilesystemError::Io {
                path: dir.to_path_buf(),
                source,
            })?;

        let leftovers: Vec<PathBuf> = known
            .keys()
            .filter(|path| path.starts_with(dir))
            .cloned()
            .collect();
        for path in leftovers {
            if let Some(record) = known.remove(&path) {
                self.store.delete(&record.key())?;
            }
        }

        report.removed = true;
        Ok(report)
    }

    pub async fn run(self: Arc<Self>) {
        let interval = self.config.current().index_interval();
        tracing::info!("Indexing plot paths every {:?}", interval);
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            self.index_all().await;
        }
    }

    /// Creates a task for every file of `dir` that has none yet. All files of
    /// one directory go to the same host, reused from any existing record.
    fn place_files(
        &self,
        config: &RelayConfig,
        dir: &Path,
        files: &[PathBuf],
        known: &mut HashMap<PathBuf, TaskRecord>,
    ) -> Result<usize, RelayError> {
        let mut host = known
            .values()
            .find(|record| record.path.starts_with(dir))
            .map(|record| record.host.clone());

        let mut created = 0;
        for file in files {
            if known.contains_key(file) {
                continue;
            }
            let host = match &host {
                Some(host) => host.clone(),
                None => {
                    let lease = assign_host(self.selector.as_ref(), config, &[])
                        .ok_or(TransportError::NoHost)?;
                    let chosen = lease.host().to_string();
                    host = Some(chosen.clone());
                    chosen
                }
            };
            tracing::info!("Index {} in {} to {}", file.display(), dir.display(), host);
            if self.create_task(config, file, &host, known)? {
                created += 1;
            }
        }
        Ok(created)
    }

    fn create_task(
        &self,
        config: &RelayConfig,
        file: &Path,
        host: &str,
        known: &mut HashMap<PathBuf, TaskRecord>,
    ) -> Result<bool, StoreError> {
        let record = TaskRecord::new_todo(config, file, host);
        let created = self.store.create(&record)?;
        if !created {
            tracing::debug!("Plot file url {} already added", record.source_url);
        }
        known.insert(file.to_path_buf(), record);
        Ok(created)
    }

    fn records_by_path(&self) -> Result<HashMap<PathBuf, TaskRecord>, StoreError> {
        let mut by_path = HashMap::new();
        self.store.for_each(&mut |record: &TaskRecord| {
            by_path.insert(record.path.clone(), record.clone());
        })?;
        Ok(by_path)
    }
}

async fn check_directory(dir: &Path) -> Result<(), FilesystemError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(FilesystemError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(FilesystemError::NotFound(dir.to_path_buf()))
        }
        Err(source) => Err(FilesystemError::Io {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

async fn walk(
    dir: PathBuf,
    extensions: Vec<String>,
    max_depth: usize,
) -> Result<Vec<PathBuf>, FilesystemError> {
    let path = dir.clone();
    tokio::task::spawn_blocking(move || plot_files(&dir, &extensions, max_depth))
        .await
        .map_err(|e| join_error(&path, e))
}

fn join_error(path: &Path, e: tokio::task::JoinError) -> FilesystemError {
    FilesystemError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    }
}
