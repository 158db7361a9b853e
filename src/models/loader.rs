//! ONNX model loader

use crate::models::head::DenseHead;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::info;

/// Loaded ONNX feature extractor with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the image tensor
    pub input_name: String,
    /// Output name for the penultimate-layer features
    pub output_name: String,
}

/// Loader for the classifier's ONNX backbone and dense head
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        // Initialize ONNX Runtime
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load the feature-extractor graph.
    ///
    /// `features_output` picks the output holding the penultimate activations;
    /// when `None`, the first output of the graph is used.
    pub fn load_backbone<P: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
        features_output: Option<&str>,
    ) -> Result<LoadedModel> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("Model has no inputs")?;

        let output_name = match features_output {
            Some(wanted) => session
                .outputs
                .iter()
                .find(|o| o.name == wanted)
                .map(|o| o.name.clone())
                .with_context(|| format!("Model has no output named {:?}", wanted))?,
            None => session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .context("Model has no outputs")?,
        };

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            output_name,
        })
    }

    /// Load the dense classifier head, checking it produces `num_classes` logits.
    pub fn load_head<P: AsRef<Path>>(&self, path: P, num_classes: usize) -> Result<DenseHead> {
        let path = path.as_ref();
        let head = DenseHead::from_json_file(path)?;

        if head.output_dim() != num_classes {
            anyhow::bail!(
                "Classifier head {} has {} outputs, expected {}",
                path.display(),
                head.output_dim(),
                num_classes
            );
        }

        info!(
            path = %path.display(),
            input_dim = head.input_dim(),
            output_dim = head.output_dim(),
            "Classifier head loaded"
        );

        Ok(head)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}
