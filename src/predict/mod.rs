//! Prediction and inference
//!
//! Load the model artifact and classify reconciled measurements.

pub mod inference;

pub use inference::{format_prediction, ModelInfo, PredictionResult, PredictionService};
