//! Calibrated inference engine for lesion classification

use crate::config::ModelConfig;
use crate::models::calibration::{calibrated_softmax, validate_temperature};
use crate::models::head::DenseHead;
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::models::provisioner::{HttpFetcher, ModelProvisioner};
use crate::preprocess::{preprocess_path, ImageTensor};
use crate::types::prediction::Prediction;
use crate::types::taxonomy::NUM_CLASSES;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info};

/// A classifier split into its two callable stages.
///
/// Calibration needs logits, not the softmax output the network was trained
/// with, so the runtime exposes the penultimate features and the final
/// projection separately.
pub trait StagedModel: Send + Sync {
    /// Run the network up to its penultimate layer
    fn features(&self, input: &ImageTensor) -> Result<Vec<f32>>;

    /// Apply the final linear layer, without softmax
    fn logits(&self, features: &[f32]) -> Result<Vec<f32>>;

    /// Human-readable model name
    fn name(&self) -> &str;
}

/// ONNX Runtime backbone paired with a dense head
pub struct OnnxLesionModel {
    /// Feature extractor (ort sessions need exclusive access to run)
    backbone: Mutex<LoadedModel>,
    /// Final projection to class logits
    head: DenseHead,
    name: String,
}

impl OnnxLesionModel {
    /// Load the model from local files
    pub fn load(
        loader: &ModelLoader,
        backbone_path: &Path,
        head_path: &Path,
        features_output: Option<&str>,
    ) -> Result<Self> {
        let backbone = loader.load_backbone(backbone_path, "backbone", features_output)?;
        let head = loader.load_head(head_path, NUM_CLASSES)?;
        let name = backbone_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "backbone".to_string());

        Ok(Self {
            backbone: Mutex::new(backbone),
            head,
            name,
        })
    }

    /// Ensure the artifacts exist locally (downloading them on first use) and load them
    pub async fn provision(config: &ModelConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.registry_url, &config.revision)?
            .with_token(std::env::var("HF_TOKEN").ok());
        let provisioner = ModelProvisioner::new(fetcher, &config.repo_id, &config.model_dir);

        let paths = provisioner
            .ensure_all(&[config.backbone_file.as_str(), config.head_file.as_str()])
            .await?;
        let (backbone_path, head_path) = (&paths[0], &paths[1]);

        let loader = ModelLoader::with_threads(config.onnx_threads)?;
        Self::load(
            &loader,
            backbone_path,
            head_path,
            config.features_output.as_deref(),
        )
    }

    /// Run the backbone session and pull out the feature vector
    fn run_backbone(model: &mut LoadedModel, input: &ImageTensor) -> Result<Vec<f32>> {
        use ort::value::Tensor;

        let input_tensor = Tensor::from_array((input.dims(), input.as_slice().to_vec()))
            .context("Failed to create input tensor")?;

        let outputs = model
            .session
            .run(ort::inputs![&model.input_name => input_tensor])?;

        let output = outputs
            .get(&model.output_name)
            .with_context(|| format!("Model produced no output named {}", model.output_name))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .context("Feature output is not an f32 tensor")?;

        debug!(model = %model.name, shape = ?shape, "Extracted features");
        Ok(data.to_vec())
    }
}

impl StagedModel for OnnxLesionModel {
    fn features(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        let mut model = self
            .backbone
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Self::run_backbone(&mut model, input)
    }

    fn logits(&self, features: &[f32]) -> Result<Vec<f32>> {
        self.head.forward(features)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Temperature-calibrated classifier over a [`StagedModel`].
///
/// Built once at startup and shared read-only between requests.
pub struct InferenceEngine {
    model: Box<dyn StagedModel>,
    temperature: f32,
}

impl InferenceEngine {
    /// Create an engine, validating the temperature
    pub fn new(model: Box<dyn StagedModel>, temperature: f32) -> Result<Self> {
        validate_temperature(temperature)?;

        info!(
            model = %model.name(),
            temperature = temperature,
            "Inference engine initialized"
        );

        Ok(Self { model, temperature })
    }

    /// Provision the configured ONNX model and wrap it in an engine
    pub async fn from_config(config: &ModelConfig, temperature: f32) -> Result<Self> {
        let model = OnnxLesionModel::provision(config).await?;
        Self::new(Box::new(model), temperature)
    }

    /// Calibration temperature
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Name of the underlying model
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Raw logits for a preprocessed image
    pub fn logits(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        let features = self.model.features(input)?;
        let logits = self.model.logits(&features)?;
        if logits.len() != NUM_CLASSES {
            anyhow::bail!(
                "Model produced {} logits, expected {}",
                logits.len(),
                NUM_CLASSES
            );
        }
        Ok(logits)
    }

    /// Run calibrated inference on a preprocessed image
    pub fn predict(&self, input: &ImageTensor) -> Result<Prediction> {
        let start = Instant::now();

        let logits = self.logits(input)?;
        let probabilities = calibrated_softmax(&logits, self.temperature);
        let prediction = Prediction::from_probabilities(&probabilities, logits, self.temperature)?
            .with_inference_time(start.elapsed());

        debug!(
            class = %prediction.class,
            confidence = prediction.confidence,
            inference_time_ms = prediction.inference_time_ms,
            "Inference complete"
        );

        Ok(prediction)
    }

    /// Preprocess an image file and classify it
    pub fn predict_path<P: AsRef<Path>>(&self, path: P) -> Result<Prediction> {
        let input = preprocess_path(path)?;
        self.predict(&input)
    }
}
