//! API Module Tests
//!
//! Calls the axum handlers directly with in-memory components.

#[cfg(test)]
mod tests {
    use crate::api::handlers::*;
    use crate::api::protocol::*;
    use crate::config::{ConfigSource, RelayConfig, StaticConfigSource};
    use crate::executor::DispatchQueue;
    use crate::indexer::Indexer;
    use crate::placement::RotationSelector;
    use crate::storage::memory::MemoryTaskStore;
    use crate::storage::types::{TaskRecord, TaskStatus};
    use crate::storage::TaskStore;

    use axum::{Extension, Json, http::StatusCode};
    use std::path::Path;
    use std::sync::Arc;

    struct Fixture {
        config: RelayConfig,
        store: Arc<dyn TaskStore>,
        queue: Arc<DispatchQueue>,
        indexer: Arc<Indexer>,
    }

    fn fixture() -> Fixture {
        let config = RelayConfig::with_hosts(["h1", "h2"]);
        let store: Arc<dyn TaskStore> = Arc::new(MemoryTaskStore::new());
        let source: Arc<dyn ConfigSource> = StaticConfigSource::new(config.clone());
        let selector = Arc::new(RotationSelector::new(&config.hosts));
        Fixture {
            indexer: Indexer::new(store.clone(), selector, source),
            queue: DispatchQueue::new(8),
            config,
            store,
        }
    }

    fn stored(f: &Fixture, status: TaskStatus) -> TaskRecord {
        let mut record = TaskRecord::new_todo(&f.config, Path::new("/p/1.plot"), "h1");
        record.status = status;
        f.store.put(&record).unwrap();
        record
    }

    async fn finish(f: &Fixture, plot_file: &str) -> (StatusCode, Json<CallbackResponse>) {
        handle_finish_plot(
            Extension(f.store.clone()),
            Extension(f.queue.clone()),
            Json(PlotCallbackRequest {
                plot_file: plot_file.to_string(),
            }),
        )
        .await
    }

    async fn fail(f: &Fixture, plot_file: &str) -> (StatusCode, Json<CallbackResponse>) {
        handle_fail_plot(
            Extension(f.store.clone()),
            Extension(f.queue.clone()),
            Json(PlotCallbackRequest {
                plot_file: plot_file.to_string(),
            }),
        )
        .await
    }

    // ============================================================
    // NEW PLOT
    // ============================================================

    #[tokio::test]
    async fn test_new_plot_reports_processed_files() {
        let f = fixture();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.plot"), b"data").unwrap();

        let (status, Json(body)) = handle_new_plot(
            Extension(f.indexer.clone()),
            Json(NewPlotRequest {
                plot_dir: dir.path().to_path_buf(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.processed, 1);
        assert!(body.error.is_none());
        assert_eq!(f.store.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_new_plot_invalid_path_is_bad_request() {
        let f = fixture();

        let (status, Json(body)) = handle_new_plot(
            Extension(f.indexer.clone()),
            Json(NewPlotRequest {
                plot_dir: "/nonexistent/plot-relay".into(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.processed, 0);
        assert!(body.error.unwrap().contains("does not exist"));
    }

    // ============================================================
    // CALLBACKS
    // ============================================================

    #[tokio::test]
    async fn test_finish_callback_marks_finish_and_queues() {
        let f = fixture();
        let record = stored(&f, TaskStatus::Wait);

        let (status, Json(body)) = finish(&f, &record.source_url).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        assert_eq!(
            f.store.get(&record.key()).unwrap().unwrap().status,
            TaskStatus::Finish
        );
        assert!(f.queue.is_in_flight(&record.key()));
    }

    #[tokio::test]
    async fn test_finish_callback_never_regresses_done() {
        let f = fixture();
        let record = stored(&f, TaskStatus::Done);

        let (status, _) = finish(&f, &record.source_url).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            f.store.get(&record.key()).unwrap().unwrap().status,
            TaskStatus::Done
        );
        assert!(!f.queue.is_in_flight(&record.key()));
    }

    #[tokio::test]
    async fn test_callback_for_unknown_plot_is_not_found() {
        let f = fixture();

        let (status, Json(body)) = finish(&f, "http://nowhere/plotfile/x.plot?dest=h1").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_fail_callback_marks_err_and_queues() {
        let f = fixture();
        let record = stored(&f, TaskStatus::Wait);

        let (status, _) = fail(&f, &record.source_url).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            f.store.get(&record.key()).unwrap().unwrap().status,
            TaskStatus::Err
        );
        assert!(f.queue.is_in_flight(&record.key()));
    }

    #[tokio::test]
    async fn test_fail_callback_leaves_finished_plot_alone() {
        let f = fixture();
        let record = stored(&f, TaskStatus::Finish);

        fail(&f, &record.source_url).await;

        assert_eq!(
            f.store.get(&record.key()).unwrap().unwrap().status,
            TaskStatus::Finish
        );
    }

    // ============================================================
    // LISTING
    // ============================================================

    #[tokio::test]
    async fn test_list_tasks_returns_every_record() {
        let f = fixture();
        stored(&f, TaskStatus::Todo);

        let (status, Json(body)) = handle_list_tasks(Extension(f.store.clone())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.tasks.len(), 1);
        assert_eq!(body.tasks[0].status, TaskStatus::Todo);
    }
}
