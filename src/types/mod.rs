//! Type definitions for the lesion classifier

pub mod prediction;
pub mod taxonomy;

pub use prediction::{ClassProbability, Prediction};
pub use taxonomy::{LesionClass, NUM_CLASSES};
