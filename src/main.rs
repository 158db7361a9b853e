//! Skin Lesion Classifier - Main Entry Point
//!
//! Provisions the model, then serves the upload / classify web front end.

use anyhow::{Context, Result};
use lesion_classifier::{
    config::{AppConfig, LoggingConfig},
    metrics::{InferenceMetrics, MetricsReporter},
    models::inference::InferenceEngine,
    server::{self, AppState, UploadStore},
};
use std::sync::Arc;
use tracing::{info, warn};

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("lesion_classifier={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    init_logging(&config.logging)?;

    info!("Starting Skin Lesion Classifier v{}", env!("CARGO_PKG_VERSION"));
    info!(
        repo = %config.model.repo_id,
        model_dir = %config.model.model_dir.display(),
        temperature = config.calibration.temperature,
        "Configuration loaded"
    );

    // Provision and load the model; any failure here is fatal
    let engine = Arc::new(
        InferenceEngine::from_config(&config.model, config.calibration.temperature)
            .await
            .context("Failed to provision model")?,
    );

    let uploads = UploadStore::new(&config.server.uploads_dir)?;
    if !config.server.static_dir.exists() {
        warn!(
            path = %config.server.static_dir.display(),
            "Static directory not found, /static will return 404"
        );
    }

    // Initialize metrics
    let metrics = Arc::new(InferenceMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = Arc::new(AppState::new(&config, engine, uploads, metrics.clone()));
    let app = server::router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Print final summary
    info!("Server shutting down...");
    metrics.print_summary();

    Ok(())
}
