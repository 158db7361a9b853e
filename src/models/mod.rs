//! Model provisioning, loading and calibrated inference

pub mod calibration;
pub mod head;
pub mod inference;
pub mod loader;
pub mod provisioner;

pub use head::DenseHead;
pub use inference::{InferenceEngine, OnnxLesionModel, StagedModel};
pub use loader::ModelLoader;
pub use provisioner::{ArtifactFetcher, HttpFetcher, ModelProvisioner};
