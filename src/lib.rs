//! Skin Lesion Classifier Library
//!
//! Classifies dermatoscopic images into seven diagnostic categories with an
//! ONNX convolutional network, calibrating its confidence by temperature
//! scaling, and serves the result through a small web front end.

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod preprocess;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use models::inference::{InferenceEngine, StagedModel};
pub use preprocess::ImageTensor;
pub use types::{prediction::Prediction, taxonomy::LesionClass};
