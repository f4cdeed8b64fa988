use super::protocol::*;
use crate::error::{FilesystemError, RelayError, StoreError};
use crate::executor::queue::DispatchQueue;
use crate::indexer::Indexer;
use crate::storage::types::{TaskKey, TaskRecord, TaskStatus};
use crate::storage::TaskStore;

use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

pub async fn handle_new_plot(
    Extension(indexer): Extension<Arc<Indexer>>,
    Json(req): Json<NewPlotRequest>,
) -> (StatusCode, Json<NewPlotResponse>) {
    tracing::info!("New plot directory {}", req.plot_dir.display());

    match indexer.register_directory(&req.plot_dir).await {
        Ok(processed) => (
            StatusCode::OK,
            Json(NewPlotResponse {
                processed,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Fail to register {}: {}", req.plot_dir.display(), e);
            let status = match &e {
                RelayError::Filesystem(
                    FilesystemError::NotFound(_) | FilesystemError::NoEligibleFiles(_),
                ) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(NewPlotResponse {
                    processed: 0,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Storage host finished downloading: `-> Finish`, unless already `Done`.
pub async fn handle_finish_plot(
    Extension(store): Extension<Arc<dyn TaskStore>>,
    Extension(queue): Extension<Arc<DispatchQueue>>,
    Json(req): Json<PlotCallbackRequest>,
) -> (StatusCode, Json<CallbackResponse>) {
    tracing::info!("Plot {} transfer finished", req.plot_file);

    let key = TaskKey(req.plot_file);
    let result = store.update(&key, &mut |r: &mut TaskRecord| {
        if r.status != TaskStatus::Done {
            r.status = TaskStatus::Finish;
        }
    });

    settle_callback(&queue, &key, result).await
}

/// Storage host gave up: `-> Err`, so the fail handler moves the plot.
pub async fn handle_fail_plot(
    Extension(store): Extension<Arc<dyn TaskStore>>,
    Extension(queue): Extension<Arc<DispatchQueue>>,
    Json(req): Json<PlotCallbackRequest>,
) -> (StatusCode, Json<CallbackResponse>) {
    tracing::warn!("Plot {} transfer failed", req.plot_file);

    let key = TaskKey(req.plot_file);
    let result = store.update(&key, &mut |r: &mut TaskRecord| {
        // A delivered plot is never moved again.
        if matches!(r.status, TaskStatus::Todo | TaskStatus::Wait) {
            r.status = TaskStatus::Err;
        }
    });

    settle_callback(&queue, &key, result).await
}

pub async fn handle_list_tasks(
    Extension(store): Extension<Arc<dyn TaskStore>>,
) -> (StatusCode, Json<TaskListResponse>) {
    match store.list() {
        Ok(tasks) => (StatusCode::OK, Json(TaskListResponse { tasks })),
        Err(e) => {
            tracing::error!("Fail to list tasks: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TaskListResponse { tasks: Vec::new() }),
            )
        }
    }
}

async fn settle_callback(
    queue: &DispatchQueue,
    key: &TaskKey,
    result: Result<TaskRecord, StoreError>,
) -> (StatusCode, Json<CallbackResponse>) {
    match result {
        Ok(record) => {
            tracing::info!("Task {} is {:?}", key, record.status);
            // An in-flight key is picked up by the next sweep instead.
            if !record.status.is_terminal() {
                queue.enqueue(record).await;
            }
            (
                StatusCode::OK,
                Json(CallbackResponse {
                    success: true,
                    error: None,
                }),
            )
        }
        Err(StoreError::NotFound(_)) => {
            tracing::warn!("Callback for unknown task {}", key);
            (
                StatusCode::NOT_FOUND,
                Json(CallbackResponse {
                    success: false,
                    error: Some(format!("unknown plot {}", key)),
                }),
            )
        }
        Err(e) => {
            tracing::error!("Fail to update task {}: {}", key, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CallbackResponse {
                    success: false,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
