//! Nearest-centroid classifier
//!
//! Only yields a label, so the prediction service serves it in degraded
//! mode with a one-hot pseudo-distribution.

use super::scaling::Standardizer;
use super::PointClassifier;
use crate::{NutriError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct NearestCentroid {
    /// One centroid per class, index-aligned with the class manifest
    centroids: Vec<Vec<f64>>,
    standardize: Option<Standardizer>,
}

impl NearestCentroid {
    pub fn new(centroids: Vec<Vec<f64>>, standardize: Option<Standardizer>) -> Result<Self> {
        let dim = centroids
            .first()
            .map(Vec::len)
            .ok_or_else(|| NutriError::Parse("no centroids".to_string()))?;
        if let Some(i) = centroids.iter().position(|c| c.len() != dim) {
            return Err(NutriError::Parse(format!(
                "centroid {} has {} values, expected {}",
                i,
                centroids[i].len(),
                dim
            )));
        }
        if let Some(scaler) = &standardize {
            scaler.validate(dim)?;
        }
        Ok(NearestCentroid {
            centroids,
            standardize,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.centroids.len()
    }

    pub fn input_dim(&self) -> usize {
        self.centroids[0].len()
    }
}

impl PointClassifier for NearestCentroid {
    fn kind(&self) -> &'static str {
        "NearestCentroid"
    }

    fn predict_label(&self, features: &[f64]) -> Result<usize> {
        if features.len() != self.input_dim() {
            return Err(NutriError::Inference(format!(
                "nearest centroid expects {} features, got {}",
                self.input_dim(),
                features.len()
            )));
        }

        let x = match &self.standardize {
            Some(scaler) => scaler.apply(features),
            None => features.to_vec(),
        };

        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, centroid) in self.centroids.iter().enumerate() {
            let dist: f64 = centroid
                .iter()
                .zip(&x)
                .map(|(c, v)| (c - v).powi(2))
                .sum();
            // strict comparison keeps the first class on ties
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }

        if !best_dist.is_finite() {
            return Err(NutriError::Inference(
                "distance to every centroid is not finite".to_string(),
            ));
        }
        Ok(best)
    }
}
