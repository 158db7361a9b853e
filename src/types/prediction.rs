//! Calibrated prediction result

use crate::models::calibration::argmax;
use crate::types::taxonomy::{LesionClass, NUM_CLASSES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Probability assigned to a single class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    /// Short class code (e.g. "NV")
    pub label: String,
    /// Calibrated probability (0.0 - 1.0)
    pub confidence: f32,
}

/// Result of running the calibrated classifier on one image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Most likely class
    pub class: LesionClass,

    /// Calibrated probability of the top class
    pub confidence: f32,

    /// Full distribution, in class-index order
    pub distribution: Vec<ClassProbability>,

    /// Raw (unscaled) logits from the classifier head
    pub logits: Vec<f32>,

    /// Temperature the logits were divided by
    pub temperature: f32,

    /// Wall-clock time spent in the model, in milliseconds
    pub inference_time_ms: f64,

    /// When the prediction was produced
    pub timestamp: DateTime<Utc>,
}

impl Prediction {
    /// Build a prediction from a calibrated probability vector.
    ///
    /// Fails if the vector does not hold exactly one entry per class.
    pub fn from_probabilities(
        probabilities: &[f32],
        logits: Vec<f32>,
        temperature: f32,
    ) -> anyhow::Result<Self> {
        if probabilities.len() != NUM_CLASSES {
            anyhow::bail!(
                "expected {} class probabilities, got {}",
                NUM_CLASSES,
                probabilities.len()
            );
        }

        let top = argmax(probabilities)
            .and_then(LesionClass::from_index)
            .ok_or_else(|| anyhow::anyhow!("empty probability vector"))?;

        let distribution = LesionClass::ALL
            .iter()
            .zip(probabilities)
            .map(|(class, &p)| ClassProbability {
                label: class.code().to_string(),
                confidence: p,
            })
            .collect();

        Ok(Self {
            class: top,
            confidence: probabilities[top.index()],
            distribution,
            logits,
            temperature,
            inference_time_ms: 0.0,
            timestamp: Utc::now(),
        })
    }

    /// Attach the measured inference latency
    pub fn with_inference_time(mut self, elapsed: Duration) -> Self {
        self.inference_time_ms = elapsed.as_secs_f64() * 1000.0;
        self
    }

    /// Long display label of the top class
    pub fn label(&self) -> &'static str {
        self.class.display_name()
    }

    /// Top confidence as a percentage string with two decimals, e.g. "87.31%"
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }

    /// Probability of a specific class
    pub fn probability_of(&self, class: LesionClass) -> f32 {
        self.distribution
            .get(class.index())
            .map(|p| p.confidence)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calibration::calibrated_softmax;

    #[test]
    fn test_prediction_from_probabilities() {
        let probs = [0.05, 0.05, 0.1, 0.05, 0.6, 0.1, 0.05];
        let prediction = Prediction::from_probabilities(&probs, vec![0.0; 7], 2.77).unwrap();

        assert_eq!(prediction.class, LesionClass::Mel);
        assert_eq!(prediction.label(), "Melanoma (MEL)");
        assert_eq!(prediction.confidence, 0.6);
        assert_eq!(prediction.distribution.len(), NUM_CLASSES);
        assert_eq!(prediction.distribution[0].label, "AKIEC");
        assert_eq!(prediction.distribution[6].label, "VASC");
        assert_eq!(prediction.probability_of(LesionClass::Bkl), 0.1);
    }

    #[test]
    fn test_top_class_matches_argmax() {
        let logits = vec![0.4, -1.0, 2.0, 0.3, 1.9, 2.0, -0.5];
        let probs = calibrated_softmax(&logits, 2.77);
        let prediction = Prediction::from_probabilities(&probs, logits, 2.77).unwrap();

        // Tie between BKL (2) and NV (5) resolves to the lower index
        assert_eq!(prediction.class, LesionClass::Bkl);
        let total: f32 = prediction.distribution.iter().map(|p| p.confidence).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_confidence_percent_format() {
        let probs = [0.873_14, 0.1, 0.02, 0.002_86, 0.002, 0.001, 0.001];
        let prediction = Prediction::from_probabilities(&probs, vec![0.0; 7], 1.0).unwrap();
        assert_eq!(prediction.confidence_percent(), "87.31%");
    }

    #[test]
    fn test_wrong_class_count_is_rejected() {
        assert!(Prediction::from_probabilities(&[0.5, 0.5], vec![], 1.0).is_err());
    }

    #[test]
    fn test_prediction_serialization() {
        let probs = [0.1, 0.1, 0.1, 0.1, 0.1, 0.4, 0.1];
        let prediction = Prediction::from_probabilities(&probs, vec![0.0; 7], 2.77)
            .unwrap()
            .with_inference_time(Duration::from_millis(12));

        let json = serde_json::to_string(&prediction).unwrap();
        let deserialized: Prediction = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.class, LesionClass::Nv);
        assert_eq!(deserialized.distribution, prediction.distribution);
        assert!((deserialized.inference_time_ms - 12.0).abs() < 1e-9);
    }
}
