//! Configuration management for the lesion classifier service

use crate::models::calibration::{validate_temperature, DEFAULT_TEMPERATURE};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable that overrides the configuration file path
pub const CONFIG_PATH_ENV: &str = "LESION_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub calibration: CalibrationConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory uploaded images are written to (served under /uploads)
    pub uploads_dir: PathBuf,
    /// Directory of static assets (served under /static)
    pub static_dir: PathBuf,
    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
}

/// Model registry and runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the model registry
    pub registry_url: String,
    /// Repository identifier in the registry
    pub repo_id: String,
    /// Repository revision (branch, tag or commit)
    pub revision: String,
    /// ONNX graph ending at the penultimate layer
    pub backbone_file: String,
    /// JSON weights of the final dense layer
    pub head_file: String,
    /// Local directory the artifacts are cached in
    pub model_dir: PathBuf,
    /// Name of the backbone output holding the features (first output if unset)
    #[serde(default)]
    pub features_output: Option<String>,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Probability calibration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Temperature the logits are divided by before softmax
    pub temperature: f32,
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between metrics summaries in the log (0 disables periodic reports)
    pub report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file, or the one named by `LESION_CONFIG`
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    ///
    /// Built-in defaults are overlaid with the file (if it exists) and then
    /// with `LESION_`-prefixed environment variables, e.g. `LESION_SERVER__PORT`.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults =
            Config::try_from(&AppConfig::default()).context("Failed to encode default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("LESION")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Check values that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<()> {
        validate_temperature(self.calibration.temperature)?;

        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.server.max_upload_bytes == 0 {
            anyhow::bail!("server.max_upload_bytes must be non-zero");
        }
        if self.model.repo_id.trim().is_empty() {
            anyhow::bail!("model.repo_id must not be empty");
        }
        if self.model.backbone_file.trim().is_empty() || self.model.head_file.trim().is_empty() {
            anyhow::bail!("model.backbone_file and model.head_file must not be empty");
        }
        if self.model.onnx_threads == 0 {
            anyhow::bail!("model.onnx_threads must be at least 1");
        }
        Ok(())
    }

    /// Socket address string the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                uploads_dir: PathBuf::from("app/uploads"),
                static_dir: PathBuf::from("app/static"),
                max_upload_bytes: 20 * 1024 * 1024,
            },
            model: ModelConfig {
                registry_url: "https://huggingface.co".to_string(),
                repo_id: "Miguel764/efficientnetv2s-skin-cancer-classifier".to_string(),
                revision: "main".to_string(),
                backbone_file: "efficientnetv2s_features.onnx".to_string(),
                head_file: "efficientnetv2s_head.json".to_string(),
                model_dir: PathBuf::from("app/model"),
                features_output: None,
                onnx_threads: 1,
            },
            calibration: CalibrationConfig {
                temperature: DEFAULT_TEMPERATURE,
            },
            metrics: MetricsConfig {
                report_interval_secs: 300,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
