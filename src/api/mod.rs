//! HTTP Surface
//!
//! ## Inbound (control port)
//! - `POST /api/v1/plot/new`: the plotter registers a directory of finished
//!   plots.
//! - `POST /api/v1/plot/finish` and `/api/v1/plot/fail`: storage hosts report
//!   the outcome of a transfer, keyed by the plot's canonical URL.
//! - `GET /api/v1/tasks`: every task record, for inspection.
//!
//! ## File server
//! `/plotfile/<absolute path>` serves plot files to the storage hosts. The
//! `dest` query parameter of a source URL is ignored here.
//!
//! ## Outbound
//! `client` posts upload notifications to `/api/v1/plot/upload` on a host.

pub mod client;
pub mod handlers;
pub mod protocol;

#[cfg(test)]
mod tests;

use crate::executor::queue::DispatchQueue;
use crate::indexer::Indexer;
use crate::storage::TaskStore;
use handlers::*;
use protocol::*;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn control_router(
    store: Arc<dyn TaskStore>,
    queue: Arc<DispatchQueue>,
    indexer: Arc<Indexer>,
) -> Router {
    Router::new()
        .route(ENDPOINT_NEW_PLOT, post(handle_new_plot))
        .route(ENDPOINT_FINISH_PLOT, post(handle_finish_plot))
        .route(ENDPOINT_FAIL_PLOT, post(handle_fail_plot))
        .route(ENDPOINT_TASKS, get(handle_list_tasks))
        .layer(Extension(store))
        .layer(Extension(queue))
        .layer(Extension(indexer))
        .layer(TraceLayer::new_for_http())
}

pub fn file_router() -> Router {
    Router::new()
        .nest_service(PLOT_FILE_PREFIX, ServeDir::new("/"))
        .layer(TraceLayer::new_for_http())
}
