//! Prediction service wrapping the loaded model artifact

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::features::{FeatureReconciler, FeatureVector, RawInput};
use crate::model::{Classifier, ModelArtifact};
use crate::{NutriError, Result};

/// Classification returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_class: String,
    /// Probability of the predicted class
    pub confidence: f64,
    /// Probability of every manifest class
    pub class_probabilities: BTreeMap<String, f64>,
    /// Time of inference
    pub timestamp: DateTime<Utc>,
}

/// Read-only description of the loaded model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub features: Vec<String>,
    pub classes: Vec<String>,
    pub metadata: Option<Map<String, Value>>,
    /// False when the classifier only yields labels and probabilities are one-hot
    pub probabilistic: bool,
}

/// Runs reconciled feature vectors through the model
#[derive(Debug)]
pub struct PredictionService {
    artifact: ModelArtifact,
    reconciler: FeatureReconciler,
}

impl PredictionService {
    pub fn new(artifact: ModelArtifact) -> Self {
        let reconciler = FeatureReconciler::new(artifact.feature_names().clone());
        PredictionService {
            artifact,
            reconciler,
        }
    }

    /// Load the artifact directory and build the service
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Ok(Self::new(ModelArtifact::load(dir)?))
    }

    /// Reconciler bound to this model's feature manifest
    pub fn reconciler(&self) -> &FeatureReconciler {
        &self.reconciler
    }

    /// Reconcile raw input and predict
    pub fn classify(&self, raw: &RawInput) -> Result<PredictionResult> {
        let vector = self.reconciler.reconcile(raw)?;
        self.predict(&vector)
    }

    pub fn predict(&self, vector: &FeatureVector) -> Result<PredictionResult> {
        let probabilities = self.distribution(vector).inspect_err(|e| {
            // values only; names and caller fields stay out of the log
            log::error!("{} for feature vector {:?}", e, vector.values());
        })?;

        // first maximum wins ties
        let mut best = 0;
        for (i, p) in probabilities.iter().enumerate() {
            if *p > probabilities[best] {
                best = i;
            }
        }

        let class_names = self.artifact.class_names();
        let class_probabilities = class_names
            .iter()
            .cloned()
            .zip(probabilities.iter().copied())
            .collect();

        Ok(PredictionResult {
            predicted_class: class_names[best].clone(),
            confidence: probabilities[best],
            class_probabilities,
            timestamp: Utc::now(),
        })
    }

    pub fn model_info(&self) -> ModelInfo {
        let metadata = self.artifact.metadata().cloned();
        let model_type = metadata
            .as_ref()
            .and_then(|m| m.get("model_type"))
            .and_then(Value::as_str)
            .unwrap_or_else(|| self.artifact.classifier().kind())
            .to_string();

        ModelInfo {
            model_type,
            features: self.artifact.feature_names().to_vec(),
            classes: self.artifact.class_names().to_vec(),
            metadata,
            probabilistic: self.artifact.classifier().is_probabilistic(),
        }
    }

    /// Probability per class in manifest order, normalized to sum to 1
    fn distribution(&self, vector: &FeatureVector) -> Result<Vec<f64>> {
        if vector.names() != self.artifact.feature_names().as_ref() {
            return Err(NutriError::Inference(
                "feature vector does not match the model manifest".to_string(),
            ));
        }

        let num_classes = self.artifact.class_names().len();
        match self.artifact.classifier() {
            Classifier::Probabilistic(model) => {
                let probs = model.predict_proba(vector.values())?;
                if probs.len() != num_classes {
                    return Err(NutriError::Inference(format!(
                        "model returned {} probabilities for {} classes",
                        probs.len(),
                        num_classes
                    )));
                }
                if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
                    return Err(NutriError::Inference(format!(
                        "model returned invalid probabilities {:?}",
                        probs
                    )));
                }
                let total: f64 = probs.iter().sum();
                if total <= 0.0 {
                    return Err(NutriError::Inference(
                        "model returned an all-zero distribution".to_string(),
                    ));
                }
                Ok(probs.into_iter().map(|p| p / total).collect())
            }
            Classifier::Point(model) => {
                let label = model.predict_label(vector.values())?;
                if label >= num_classes {
                    return Err(NutriError::Inference(format!(
                        "model predicted class index {} of {}",
                        label, num_classes
                    )));
                }
                let mut probs = vec![0.0; num_classes];
                probs[label] = 1.0;
                Ok(probs)
            }
        }
    }
}

/// Format a prediction for display
pub fn format_prediction(result: &PredictionResult) -> String {
    let mut ranked: Vec<_> = result.class_probabilities.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(a.1));

    let mut out = format!(
        r#"
┌─────────────────────────────────────────────────┐
│  Predicted class:  {} ({:.1}%)
├─────────────────────────────────────────────────┤
"#,
        result.predicted_class,
        result.confidence * 100.0
    );
    for (class, p) in ranked {
        out.push_str(&format!("│  {:<16}  {:>5.1}%\n", class, p * 100.0));
    }
    out.push_str("└─────────────────────────────────────────────────┘\n");
    out
}
