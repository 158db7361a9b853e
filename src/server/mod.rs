//! Web front end: upload, classify, render.

pub mod routes;
pub mod uploads;
pub mod views;

use crate::config::AppConfig;
use crate::metrics::InferenceMetrics;
use crate::models::inference::InferenceEngine;
use crate::preprocess::INPUT_SIZE;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use uploads::{UploadStore, UPLOADS_ROUTE};
pub use views::ModelInfo;

/// Shared application state, built once at startup
pub struct AppState {
    /// Calibrated classifier (read-only after construction)
    pub engine: Arc<InferenceEngine>,
    /// Uploaded image storage
    pub uploads: UploadStore,
    /// Request statistics
    pub metrics: Arc<InferenceMetrics>,
    /// Facts shown on the model info page
    pub model_info: ModelInfo,
    /// Static asset directory
    pub static_dir: PathBuf,
    /// Maximum request body size in bytes
    pub max_upload_bytes: usize,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        engine: Arc<InferenceEngine>,
        uploads: UploadStore,
        metrics: Arc<InferenceMetrics>,
    ) -> Self {
        Self {
            model_info: ModelInfo {
                repo_id: config.model.repo_id.clone(),
                backbone_file: config.model.backbone_file.clone(),
                head_file: config.model.head_file.clone(),
                temperature: engine.temperature(),
                input_size: INPUT_SIZE,
            },
            engine,
            uploads,
            metrics,
            static_dir: config.server.static_dir.clone(),
            max_upload_bytes: config.server.max_upload_bytes,
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let uploads_dir = ServeDir::new(state.uploads.dir());
    let static_dir = ServeDir::new(&state.static_dir);
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(routes::index))
        .route("/model-info", get(routes::model_info))
        .route("/upload-image", post(routes::upload_image))
        .route("/predict", post(routes::predict))
        .route("/health", get(routes::health))
        .nest_service(UPLOADS_ROUTE, uploads_dir)
        .nest_service("/static", static_dir)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}
