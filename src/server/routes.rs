//! HTTP handlers

use crate::error::ServerError;
use crate::server::views::{self, MainView};
use crate::server::SharedState;
use anyhow::Context;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::FormRejection;
use axum::extract::{Multipart, State};
use axum::response::Html;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{info, warn};

/// GET / - Upload form
pub async fn index() -> Html<String> {
    Html(views::main_page(&MainView::default()))
}

/// GET /model-info - Model description
pub async fn model_info(State(state): State<SharedState>) -> Html<String> {
    Html(views::model_info_page(&state.model_info))
}

/// POST /upload-image - Store a multipart `file` field and show it
pub async fn upload_image(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, ServerError> {
    let mut multipart = multipart?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Invalid upload: {}", e)))?;

        let stored = state.uploads.save(&original_name, &bytes).await?;
        state.metrics.record_upload();

        info!(
            file = %stored.file_name,
            bytes = bytes.len(),
            "Image uploaded"
        );

        return Ok(Html(views::main_page(&MainView {
            image_path: Some(&stored.public_path),
            prediction: None,
        })));
    }

    Err(ServerError::BadRequest(
        "Missing \"file\" field in upload".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PredictForm {
    pub image_path: String,
}

/// POST /predict - Classify a previously uploaded image
pub async fn predict(
    State(state): State<SharedState>,
    form: Result<Form<PredictForm>, FormRejection>,
) -> Result<Html<String>, ServerError> {
    let Form(form) = form?;
    let path = state.uploads.resolve(&form.image_path).ok_or_else(|| {
        ServerError::BadRequest(format!("Not an uploaded image: {}", form.image_path))
    })?;

    let exists = tokio::fs::try_exists(&path)
        .await
        .with_context(|| format!("Failed to check {}", path.display()))?;
    if !exists {
        return Err(ServerError::NotFound(format!(
            "Image {} does not exist",
            form.image_path
        )));
    }

    let start = Instant::now();
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.predict_path(&path))
        .await
        .context("Inference task panicked")
        .and_then(|r| r);

    let prediction = match result {
        Ok(prediction) => prediction,
        Err(e) => {
            state.metrics.record_failure();
            warn!(image = %form.image_path, error = %e, "Prediction failed");
            return Err(ServerError::Internal(e));
        }
    };

    state.metrics.record_prediction(start.elapsed(), &prediction);

    info!(
        image = %form.image_path,
        class = %prediction.class,
        confidence = prediction.confidence,
        inference_time_ms = prediction.inference_time_ms,
        "Prediction served"
    );

    Ok(Html(views::main_page(&MainView {
        image_path: Some(&form.image_path),
        prediction: Some(&prediction),
    })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub model: String,
    pub predictions_served: u64,
}

/// GET /health - Health check endpoint
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.engine.model_name().to_string(),
        predictions_served: state.metrics.predictions_served.load(Ordering::Relaxed),
    })
}
