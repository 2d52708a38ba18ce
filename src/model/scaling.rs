//! Z-score standardization fitted at training time

use serde::{Deserialize, Serialize};

use crate::{NutriError, Result};

/// Per-feature mean and standard deviation: x' = (x - mean) / std
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Standardizer {
    /// Check the standardizer fits `dim` features
    pub fn validate(&self, dim: usize) -> Result<()> {
        if self.mean.len() != dim || self.std.len() != dim {
            return Err(NutriError::Parse(format!(
                "standardizer has {} means and {} deviations for {} features",
                self.mean.len(),
                self.std.len(),
                dim
            )));
        }
        if let Some(i) = self.std.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(NutriError::Parse(format!(
                "standardizer deviation {} is not positive: {}",
                i, self.std[i]
            )));
        }
        Ok(())
    }

    pub fn apply(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }
}
