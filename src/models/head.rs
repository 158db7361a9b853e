//! Final dense layer of the classifier, applied without its softmax

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Linear projection from penultimate features to class logits.
///
/// `kernel` is stored the way Keras stores a Dense kernel: one row per input
/// feature, one column per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseHead {
    kernel: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl DenseHead {
    /// Create a head, checking that every kernel row matches the bias length.
    pub fn new(kernel: Vec<Vec<f32>>, bias: Vec<f32>) -> Result<Self> {
        if bias.is_empty() {
            anyhow::bail!("classifier head has no outputs");
        }
        if kernel.is_empty() {
            anyhow::bail!("classifier head has no input features");
        }
        if let Some((row, r)) = kernel.iter().enumerate().find(|(_, r)| r.len() != bias.len()) {
            anyhow::bail!(
                "kernel row {} has {} columns, expected {}",
                row,
                r.len(),
                bias.len()
            );
        }
        Ok(Self { kernel, bias })
    }

    /// Load head weights from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)
            .with_context(|| format!("Failed to read classifier head {}", path.display()))?;
        let parsed: DenseHead = serde_json::from_slice(&raw)
            .with_context(|| format!("Failed to parse classifier head {}", path.display()))?;
        // Re-validate: serde does not check the shape
        Self::new(parsed.kernel, parsed.bias)
    }

    /// Number of input features
    pub fn input_dim(&self) -> usize {
        self.kernel.len()
    }

    /// Number of output classes
    pub fn output_dim(&self) -> usize {
        self.bias.len()
    }

    /// Compute logits: `bias[j] + sum_i features[i] * kernel[i][j]`
    pub fn forward(&self, features: &[f32]) -> Result<Vec<f32>> {
        if features.len() != self.input_dim() {
            anyhow::bail!(
                "feature vector has {} values, classifier head expects {}",
                features.len(),
                self.input_dim()
            );
        }

        let mut logits = self.bias.clone();
        for (&x, row) in features.iter().zip(&self.kernel) {
            for (logit, &w) in logits.iter_mut().zip(row) {
                *logit += x * w;
            }
        }
        Ok(logits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_head() -> DenseHead {
        // 3 features -> 2 classes
        DenseHead::new(
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, -1.0]],
            vec![0.5, -0.5],
        )
        .unwrap()
    }

    #[test]
    fn test_forward() {
        let head = small_head();
        let logits = head.forward(&[1.0, 2.0, 3.0]).unwrap();
        // class 0: 0.5 + 1*1 + 2*0 + 3*2 = 7.5
        // class 1: -0.5 + 1*0 + 2*1 + 3*-1 = -1.5
        assert_eq!(logits, vec![7.5, -1.5]);
    }

    #[test]
    fn test_zero_features_give_bias() {
        let head = small_head();
        assert_eq!(head.forward(&[0.0; 3]).unwrap(), vec![0.5, -0.5]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let head = small_head();
        assert!(head.forward(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_ragged_kernel_is_rejected() {
        assert!(DenseHead::new(vec![vec![1.0, 2.0], vec![1.0]], vec![0.0, 0.0]).is_err());
        assert!(DenseHead::new(vec![], vec![0.0]).is_err());
        assert!(DenseHead::new(vec![vec![]], vec![]).is_err());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("head.json");
        std::fs::write(&path, r#"{"kernel": [[1.0, 2.0], [3.0, 4.0]], "bias": [0.0, 1.0]}"#)
            .unwrap();

        let head = DenseHead::from_json_file(&path).unwrap();
        assert_eq!(head.input_dim(), 2);
        assert_eq!(head.output_dim(), 2);
        assert_eq!(head.forward(&[1.0, 1.0]).unwrap(), vec![4.0, 7.0]);
    }

    #[test]
    fn test_json_file_with_bad_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("head.json");
        std::fs::write(&path, r#"{"kernel": [[1.0], [3.0, 4.0]], "bias": [0.0, 1.0]}"#).unwrap();
        assert!(DenseHead::from_json_file(&path).is_err());
    }
}
