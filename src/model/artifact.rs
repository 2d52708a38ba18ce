//! Model artifact loading
//!
//! An artifact directory holds:
//! - `classifier.json`: which classifier to build and its parameters
//! - `classifier.mpk`: burn weights, for MLP classifiers only
//! - `feature_names.json`: feature names in the order the model was fit on
//! - `class_names.json`: class names, index-aligned with the model outputs
//! - `model_metadata.json` (optional): free-form training metadata
//!
//! Any problem with a required file is fatal; the service must not start
//! without a model.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::centroid::NearestCentroid;
use super::mlp::{MlpClassifier, MlpConfig};
use super::scaling::Standardizer;
use super::Classifier;
use crate::{NutriError, Result};

/// Contents of `classifier.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifierSpec {
    Mlp {
        hidden_dims: Vec<usize>,
        #[serde(default)]
        standardize: Option<Standardizer>,
    },
    NearestCentroid {
        centroids: Vec<Vec<f64>>,
        #[serde(default)]
        standardize: Option<Standardizer>,
    },
}

impl ClassifierSpec {
    /// Build the classifier, checking it fits the manifests
    pub fn build(self, dir: &Path, num_features: usize, num_classes: usize) -> Result<Classifier> {
        match self {
            ClassifierSpec::Mlp {
                hidden_dims,
                standardize,
            } => {
                let config = MlpConfig {
                    input_dim: num_features,
                    hidden_dims,
                    num_classes,
                };
                config.validate()?;

                let weights = dir.join(ModelArtifact::WEIGHTS_STEM);
                if !weights.with_extension("mpk").exists() {
                    return Err(NutriError::Parse(format!(
                        "MLP weights not found at {}.mpk",
                        weights.display()
                    )));
                }
                let model = MlpClassifier::load(&weights, config, standardize)?;
                Ok(Classifier::Probabilistic(Box::new(model)))
            }
            ClassifierSpec::NearestCentroid {
                centroids,
                standardize,
            } => {
                let model = NearestCentroid::new(centroids, standardize)?;
                if model.num_classes() != num_classes {
                    return Err(NutriError::Parse(format!(
                        "{} centroids for {} classes",
                        model.num_classes(),
                        num_classes
                    )));
                }
                if model.input_dim() != num_features {
                    return Err(NutriError::Parse(format!(
                        "centroids have {} values for {} features",
                        model.input_dim(),
                        num_features
                    )));
                }
                Ok(Classifier::Point(Box::new(model)))
            }
        }
    }
}

/// Immutable model bundle, loaded once per process
#[derive(Debug)]
pub struct ModelArtifact {
    classifier: Classifier,
    feature_names: Arc<[String]>,
    class_names: Vec<String>,
    metadata: Option<Map<String, Value>>,
}

impl ModelArtifact {
    pub const CLASSIFIER_FILE: &'static str = "classifier.json";
    pub const WEIGHTS_STEM: &'static str = "classifier";
    pub const FEATURES_FILE: &'static str = "feature_names.json";
    pub const CLASSES_FILE: &'static str = "class_names.json";
    pub const METADATA_FILE: &'static str = "model_metadata.json";

    /// Assemble an artifact from parts, validating the manifests
    pub fn new(
        classifier: Classifier,
        feature_names: Vec<String>,
        class_names: Vec<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Self> {
        check_names("feature", &feature_names)?;
        check_names("class", &class_names)?;
        Ok(ModelArtifact {
            classifier,
            feature_names: feature_names.into(),
            class_names,
            metadata,
        })
    }

    /// Load every artifact file from `dir`
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let unavailable = |path: PathBuf, err: NutriError| match err {
            NutriError::ModelUnavailable { .. } => err,
            other => NutriError::ModelUnavailable {
                path,
                reason: other.to_string(),
            },
        };

        let features_path = dir.join(Self::FEATURES_FILE);
        let feature_names: Vec<String> = read_json(&features_path)?;
        check_names("feature", &feature_names).map_err(|e| unavailable(features_path, e))?;
        let classes_path = dir.join(Self::CLASSES_FILE);
        let class_names: Vec<String> = read_json(&classes_path)?;
        check_names("class", &class_names).map_err(|e| unavailable(classes_path, e))?;

        let classifier_path = dir.join(Self::CLASSIFIER_FILE);
        let spec: ClassifierSpec = read_json(&classifier_path)?;
        let classifier = spec
            .build(dir, feature_names.len(), class_names.len())
            .map_err(|e| unavailable(classifier_path, e))?;

        let metadata = read_metadata(&dir.join(Self::METADATA_FILE));

        let artifact = Self::new(classifier, feature_names, class_names, metadata)
            .map_err(|e| unavailable(dir.to_path_buf(), e))?;

        log::info!(
            "Loaded {} model from {}: {} features, {} classes",
            artifact.classifier.kind(),
            dir.display(),
            artifact.feature_names.len(),
            artifact.class_names.len()
        );
        if !artifact.classifier.is_probabilistic() {
            log::warn!("Classifier has no probability output, serving one-hot distributions");
        }

        Ok(artifact)
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn feature_names(&self) -> &Arc<[String]> {
        &self.feature_names
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }
}

fn check_names(kind: &str, names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(NutriError::Parse(format!("{} list is empty", kind)));
    }
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(NutriError::Parse(format!("empty {} name", kind)));
        }
        if !seen.insert(name.as_str()) {
            return Err(NutriError::Parse(format!("duplicate {} name: {}", kind, name)));
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| NutriError::ModelUnavailable {
        path: path.to_path_buf(),
        reason: format!("failed to read: {}", e),
    })?;
    serde_json::from_str(&content).map_err(|e| NutriError::ModelUnavailable {
        path: path.to_path_buf(),
        reason: format!("failed to parse: {}", e),
    })
}

/// The metadata file is optional; a broken one is logged and ignored
fn read_metadata(path: &Path) -> Option<Map<String, Value>> {
    if !path.exists() {
        return None;
    }
    match read_json::<Map<String, Value>>(path) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            log::warn!("Ignoring model metadata: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mlp::{InferenceBackend, MlpNet};

    const FEATURES: [&str; 4] = ["Sex", "Age", "Height", "Weight"];
    const CLASSES: [&str; 3] = ["Low", "Moderate", "Critical"];

    fn write_json(dir: &Path, file: &str, value: &impl Serialize) {
        std::fs::write(dir.join(file), serde_json::to_string(value).unwrap()).unwrap();
    }

    fn write_manifests(dir: &Path) {
        write_json(dir, ModelArtifact::FEATURES_FILE, &FEATURES);
        write_json(dir, ModelArtifact::CLASSES_FILE, &CLASSES);
    }

    fn centroid_spec() -> ClassifierSpec {
        ClassifierSpec::NearestCentroid {
            centroids: vec![vec![0.0; 4], vec![1.0; 4], vec![2.0; 4]],
            standardize: None,
        }
    }

    #[test]
    fn test_load_centroid_artifact() {
        let dir = tempfile::tempdir().unwrap();
        write_manifests(dir.path());
        write_json(dir.path(), ModelArtifact::CLASSIFIER_FILE, &centroid_spec());
        std::fs::write(
            dir.path().join(ModelArtifact::METADATA_FILE),
            r#"{"model_type": "NearestCentroid", "training_date": "2024-05-01"}"#,
        )
        .unwrap();

        let artifact = ModelArtifact::load(dir.path()).unwrap();
        assert_eq!(artifact.feature_names().len(), 4);
        assert_eq!(artifact.class_names(), &CLASSES);
        assert!(!artifact.classifier().is_probabilistic());
        assert_eq!(
            artifact.metadata().unwrap()["training_date"],
            Value::String("2024-05-01".to_string())
        );
    }

    #[test]
    fn test_load_mlp_artifact() {
        let dir = tempfile::tempdir().unwrap();
        write_manifests(dir.path());
        write_json(
            dir.path(),
            ModelArtifact::CLASSIFIER_FILE,
            &ClassifierSpec::Mlp {
                hidden_dims: vec![8],
                standardize: None,
            },
        );
        let config = MlpConfig {
            input_dim: 4,
            hidden_dims: vec![8],
            num_classes: 3,
        };
        let net = MlpNet::<InferenceBackend>::new(&Default::default(), &config);
        net.save(&dir.path().join(ModelArtifact::WEIGHTS_STEM))
            .unwrap();

        let artifact = ModelArtifact::load(dir.path()).unwrap();
        assert!(artifact.classifier().is_probabilistic());
        assert_eq!(artifact.classifier().kind(), "MLP");
        assert!(artifact.metadata().is_none());
    }

    #[test]
    fn test_missing_required_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_manifests(dir.path());

        match ModelArtifact::load(dir.path()).unwrap_err() {
            NutriError::ModelUnavailable { path, .. } => {
                assert_eq!(path, dir.path().join(ModelArtifact::CLASSIFIER_FILE))
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_mlp_weights_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_manifests(dir.path());
        write_json(
            dir.path(),
            ModelArtifact::CLASSIFIER_FILE,
            &ClassifierSpec::Mlp {
                hidden_dims: vec![8],
                standardize: None,
            },
        );

        let err = ModelArtifact::load(dir.path()).unwrap_err();
        assert!(matches!(err, NutriError::ModelUnavailable { .. }));
    }

    fn write_mlp_spec(dir: &Path, hidden_dims: Vec<usize>) {
        write_json(
            dir,
            ModelArtifact::CLASSIFIER_FILE,
            &ClassifierSpec::Mlp {
                hidden_dims,
                standardize: None,
            },
        );
    }

    fn expect_unavailable(dir: &Path) {
        match ModelArtifact::load(dir).unwrap_err() {
            NutriError::ModelUnavailable { .. } => {}
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_mlp_weights_must_fit_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_manifests(dir.path());
        write_mlp_spec(dir.path(), vec![8]);
        let trained_on = MlpConfig {
            input_dim: 5,
            hidden_dims: vec![8],
            num_classes: 3,
        };
        MlpNet::<InferenceBackend>::new(&Default::default(), &trained_on)
            .save(&dir.path().join(ModelArtifact::WEIGHTS_STEM))
            .unwrap();

        expect_unavailable(dir.path());
    }

    #[test]
    fn test_empty_feature_list_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), ModelArtifact::FEATURES_FILE, &Vec::<String>::new());
        write_json(dir.path(), ModelArtifact::CLASSES_FILE, &CLASSES);
        write_mlp_spec(dir.path(), vec![4]);
        let config = MlpConfig {
            input_dim: 1,
            hidden_dims: vec![4],
            num_classes: 3,
        };
        MlpNet::<InferenceBackend>::new(&Default::default(), &config)
            .save(&dir.path().join(ModelArtifact::WEIGHTS_STEM))
            .unwrap();

        match ModelArtifact::load(dir.path()).unwrap_err() {
            NutriError::ModelUnavailable { path, reason } => {
                assert_eq!(path, dir.path().join(ModelArtifact::FEATURES_FILE));
                assert!(reason.contains("feature list is empty"), "{}", reason);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_zero_width_hidden_layer_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        write_manifests(dir.path());
        write_mlp_spec(dir.path(), vec![0]);

        expect_unavailable(dir.path());
    }

    #[test]
    fn test_centroid_count_must_match_classes() {
        let dir = tempfile::tempdir().unwrap();
        write_manifests(dir.path());
        write_json(
            dir.path(),
            ModelArtifact::CLASSIFIER_FILE,
            &ClassifierSpec::NearestCentroid {
                centroids: vec![vec![0.0; 4], vec![1.0; 4]],
                standardize: None,
            },
        );

        let err = ModelArtifact::load(dir.path()).unwrap_err();
        assert!(matches!(err, NutriError::ModelUnavailable { .. }));
    }

    #[test]
    fn test_broken_metadata_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_manifests(dir.path());
        write_json(dir.path(), ModelArtifact::CLASSIFIER_FILE, &centroid_spec());
        std::fs::write(dir.path().join(ModelArtifact::METADATA_FILE), "not json").unwrap();

        let artifact = ModelArtifact::load(dir.path()).unwrap();
        assert!(artifact.metadata().is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let model = NearestCentroid::new(vec![vec![0.0], vec![1.0]], None).unwrap();
        let err = ModelArtifact::new(
            Classifier::Point(Box::new(model)),
            vec!["Age".to_string()],
            vec!["Low".to_string(), "Low".to_string()],
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate class name"));
    }
}
