//! Feature reconciliation
//!
//! Converts caller-supplied measurements into model-ready feature vectors.

pub mod aliases;
pub mod encoding;
pub mod input;
pub mod reconcile;
pub mod validation;

pub use aliases::Field;
pub use input::{RawInput, SexValue};
pub use reconcile::{FeatureReconciler, FeatureVector, Measurements};
pub use validation::validate_ranges;
