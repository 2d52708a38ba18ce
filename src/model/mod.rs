//! Trained classifiers and the artifact they are loaded from
//!
//! Two capabilities exist:
//! - probabilistic classifiers return a full class distribution (MLP)
//! - point classifiers return only a class index (nearest centroid)

pub mod artifact;
pub mod centroid;
pub mod mlp;
pub mod scaling;

pub use artifact::{ClassifierSpec, ModelArtifact};
pub use centroid::NearestCentroid;
pub use mlp::{MlpClassifier, MlpConfig, MlpNet};
pub use scaling::Standardizer;

use crate::Result;

/// Classifier that scores every class
pub trait ProbabilisticClassifier: Send + Sync + std::fmt::Debug {
    /// Short model family name, e.g. "MLP"
    fn kind(&self) -> &'static str;

    /// One probability per class, in manifest class order
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>>;
}

/// Classifier that only names the winning class
pub trait PointClassifier: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> &'static str;

    /// Index of the predicted class in manifest class order
    fn predict_label(&self, features: &[f64]) -> Result<usize>;
}

#[derive(Debug)]
pub enum Classifier {
    Probabilistic(Box<dyn ProbabilisticClassifier>),
    Point(Box<dyn PointClassifier>),
}

impl Classifier {
    pub fn kind(&self) -> &'static str {
        match self {
            Classifier::Probabilistic(model) => model.kind(),
            Classifier::Point(model) => model.kind(),
        }
    }

    pub fn is_probabilistic(&self) -> bool {
        matches!(self, Classifier::Probabilistic(_))
    }
}
