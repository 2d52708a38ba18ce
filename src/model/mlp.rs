//! MLP classifier over the reconciled feature vector
//!
//! Architecture: Input(features) → [Linear → ReLU] per hidden dim
//!                               → Linear(num_classes) → softmax

use std::path::Path;
use std::sync::Mutex;

use burn::backend::NdArray;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::activation::{relu, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::scaling::Standardizer;
use super::ProbabilisticClassifier;
use crate::{NutriError, Result};

/// CPU backend used for serving
pub type InferenceBackend = NdArray<f32>;

/// Configuration for the MLP classifier
#[derive(Debug, Clone, PartialEq)]
pub struct MlpConfig {
    /// Number of manifest features
    pub input_dim: usize,
    /// Hidden layer widths, e.g. [64, 32]
    pub hidden_dims: Vec<usize>,
    /// Number of manifest classes
    pub num_classes: usize,
}

impl MlpConfig {
    /// Every layer needs at least one input and one output unit
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 || self.num_classes == 0 {
            return Err(NutriError::Parse(format!(
                "MLP needs at least one feature and one class, got {} and {}",
                self.input_dim, self.num_classes
            )));
        }
        if let Some(i) = self.hidden_dims.iter().position(|&d| d == 0) {
            return Err(NutriError::Parse(format!("hidden layer {} has width 0", i)));
        }
        Ok(())
    }

    /// Weight shape `[d_input, d_output]` of each layer, in forward order
    pub fn layer_shapes(&self) -> Vec<[usize; 2]> {
        let mut widths = vec![self.input_dim];
        widths.extend(&self.hidden_dims);
        widths.push(self.num_classes);
        widths.windows(2).map(|w| [w[0], w[1]]).collect()
    }
}

/// A single hidden layer block: Linear → ReLU
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> HiddenBlock<B> {
    pub fn new(device: &B::Device, in_dim: usize, out_dim: usize) -> Self {
        HiddenBlock {
            linear: LinearConfig::new(in_dim, out_dim).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        relu(self.linear.forward(x))
    }
}

/// Feed-forward network producing one logit per class
#[derive(Module, Debug)]
pub struct MlpNet<B: Backend> {
    hidden: Vec<HiddenBlock<B>>,
    head: Linear<B>,
}

impl<B: Backend> MlpNet<B> {
    pub fn new(device: &B::Device, config: &MlpConfig) -> Self {
        let mut hidden = Vec::with_capacity(config.hidden_dims.len());
        let mut in_dim = config.input_dim;
        for &out_dim in &config.hidden_dims {
            hidden.push(HiddenBlock::new(device, in_dim, out_dim));
            in_dim = out_dim;
        }

        MlpNet {
            hidden,
            head: LinearConfig::new(in_dim, config.num_classes).init(device),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Features [batch, input_dim]
    ///
    /// # Returns
    /// Class logits [batch, num_classes]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden.iter().fold(x, |x, block| block.forward(x));
        self.head.forward(x)
    }

    /// Save weights; burn appends the `.mpk` extension
    pub fn save(&self, path: &Path) -> Result<()>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.clone().into_record(), path.to_path_buf())
            .map_err(|e| NutriError::Io(std::io::Error::other(e.to_string())))
    }

    /// Load weights saved with [`MlpNet::save`]
    ///
    /// The stored layer shapes must match `config` exactly.
    pub fn load(device: &B::Device, path: &Path, config: &MlpConfig) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        config.validate()?;

        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record: MlpNetRecord<B> = recorder
            .load(path.to_path_buf(), device)
            .map_err(|e| NutriError::Io(std::io::Error::other(e.to_string())))?;

        let mut stored: Vec<[usize; 2]> = record
            .hidden
            .iter()
            .map(|block| block.linear.weight.val().dims())
            .collect();
        stored.push(record.head.weight.val().dims());
        let expected = config.layer_shapes();
        if stored != expected {
            return Err(NutriError::Parse(format!(
                "stored MLP layers {:?} do not fit the manifest, expected {:?}",
                stored, expected
            )));
        }

        let model = Self::new(device, config);
        Ok(model.load_record(record))
    }
}

/// Probabilistic classifier backed by [`MlpNet`]
#[derive(Debug)]
pub struct MlpClassifier {
    // burn modules are only guaranteed `Send`
    net: Mutex<MlpNet<InferenceBackend>>,
    device: <InferenceBackend as Backend>::Device,
    config: MlpConfig,
    standardize: Option<Standardizer>,
}

impl MlpClassifier {
    pub fn new(
        net: MlpNet<InferenceBackend>,
        config: MlpConfig,
        standardize: Option<Standardizer>,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(scaler) = &standardize {
            scaler.validate(config.input_dim)?;
        }
        Ok(MlpClassifier {
            net: Mutex::new(net),
            device: Default::default(),
            config,
            standardize,
        })
    }

    /// Load weights from `<path>.mpk`
    pub fn load(
        path: &Path,
        config: MlpConfig,
        standardize: Option<Standardizer>,
    ) -> Result<Self> {
        let device = Default::default();
        let net = MlpNet::<InferenceBackend>::load(&device, path, &config)?;
        Self::new(net, config, standardize)
    }
}

impl ProbabilisticClassifier for MlpClassifier {
    fn kind(&self) -> &'static str {
        "MLP"
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.config.input_dim {
            return Err(NutriError::Inference(format!(
                "MLP expects {} features, got {}",
                self.config.input_dim,
                features.len()
            )));
        }

        let scaled = match &self.standardize {
            Some(scaler) => scaler.apply(features),
            None => features.to_vec(),
        };
        let input: Vec<f32> = scaled.iter().map(|&v| v as f32).collect();
        let input = Tensor::<InferenceBackend, 1>::from_floats(input.as_slice(), &self.device)
            .reshape([1, self.config.input_dim]);

        let logits = {
            let net = self
                .net
                .lock()
                .map_err(|_| NutriError::Inference("MLP lock poisoned".to_string()))?;
            net.forward(input)
        };
        let probs = softmax(logits, 1).into_data();
        let probs = probs
            .to_vec::<f32>()
            .map_err(|e| NutriError::Inference(format!("{:?}", e)))?;

        Ok(probs.into_iter().map(f64::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MlpConfig {
        MlpConfig {
            input_dim: 6,
            hidden_dims: vec![16, 8],
            num_classes: 4,
        }
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let net = MlpNet::<InferenceBackend>::new(&device, &config());

        let x = Tensor::random(
            [3, 6],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        assert_eq!(net.forward(x).dims(), [3, 4]);
    }

    #[test]
    fn test_probabilities_form_distribution() {
        let device = Default::default();
        let net = MlpNet::<InferenceBackend>::new(&device, &config());
        let classifier = MlpClassifier::new(net, config(), None).unwrap();

        let probs = classifier
            .predict_proba(&[1.0, 24.0, 80.0, 9.5, -2.1, -1.8])
            .unwrap();
        assert_eq!(probs.len(), 4);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "sum = {}", sum);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let device = Default::default();
        let net = MlpNet::<InferenceBackend>::new(&device, &config());
        let classifier = MlpClassifier::new(net, config(), None).unwrap();

        let err = classifier.predict_proba(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, NutriError::Inference(_)));
    }

    #[test]
    fn test_layer_shapes() {
        assert_eq!(config().layer_shapes(), vec![[6, 16], [16, 8], [8, 4]]);
    }

    #[test]
    fn test_zero_widths_rejected() {
        let mut zero_hidden = config();
        zero_hidden.hidden_dims = vec![16, 0];
        assert!(matches!(zero_hidden.validate(), Err(NutriError::Parse(_))));

        let mut no_features = config();
        no_features.input_dim = 0;
        assert!(matches!(no_features.validate(), Err(NutriError::Parse(_))));
    }

    #[test]
    fn test_load_rejects_weights_of_another_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier");
        let device = Default::default();
        MlpNet::<InferenceBackend>::new(&device, &config())
            .save(&path)
            .unwrap();

        let mut narrower = config();
        narrower.input_dim = 5;
        let mut fewer_classes = config();
        fewer_classes.num_classes = 3;
        let mut shallower = config();
        shallower.hidden_dims = vec![16];

        for other in [narrower, fewer_classes, shallower] {
            let err = MlpClassifier::load(&path, other, None).unwrap_err();
            assert!(matches!(err, NutriError::Parse(_)), "{}", err);
        }
    }

    #[test]
    fn test_save_and_load_preserve_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier");
        let device = Default::default();

        let net = MlpNet::<InferenceBackend>::new(&device, &config());
        net.save(&path).unwrap();
        assert!(dir.path().join("classifier.mpk").exists());

        let features = [0.0, 24.0, 80.0, 9.5, -2.1, -1.8];
        let original = MlpClassifier::new(net, config(), None).unwrap();
        let loaded = MlpClassifier::load(&path, config(), None).unwrap();

        assert_eq!(
            original.predict_proba(&features).unwrap(),
            loaded.predict_proba(&features).unwrap()
        );
    }
}
