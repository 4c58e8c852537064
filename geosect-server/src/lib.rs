//! geosect-server library interface
//!
//! Section records with their geological classes, exposed over HTTP, plus
//! background spreadsheet import/export jobs.

pub mod api;
pub mod db;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

use crate::db::SectionStore;
use crate::services::FileJobs;

/// Default upload limit for spreadsheet imports (16 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Section persistence
    pub store: Arc<dyn SectionStore>,
    /// Import/export jobs and their registry
    pub jobs: FileJobs,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Largest accepted import upload
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn SectionStore>, jobs: FileJobs) -> Self {
        Self {
            store,
            jobs,
            startup_time: Utc::now(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::section_routes())
        .merge(api::file_routes(state.max_upload_bytes))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
