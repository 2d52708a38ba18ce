//! Feature reconciliation
//!
//! Turns a loosely structured `RawInput` into the exact, ordered feature
//! vector the trained model was fit on:
//! 1. categorical values are encoded (sex → 0/1, income → one-hot)
//! 2. height in metres, BMI and weight-height ratio are derived when absent
//! 3. every manifest column is filled through the alias table
//!
//! The order of the output always follows the manifest. Column order errors
//! do not fail at inference time, they silently produce wrong predictions.

use std::sync::Arc;

use super::aliases::Field;
use super::encoding::{encode_sex, income_indicators, resolve_income};
use super::input::RawInput;
use crate::{IncomeLevel, NutriError, Result, Sex};

/// Encoded and derived values for every known field
#[derive(Debug, Clone, PartialEq)]
pub struct Measurements {
    values: [Option<f64>; Field::COUNT],
    pub sex: Option<Sex>,
    pub income_level: Option<IncomeLevel>,
}

impl Measurements {
    /// Encode categoricals and derive missing quantities. Never touches `raw`.
    pub fn from_raw(raw: &RawInput) -> Result<Self> {
        let sex = raw.sex.as_ref().map(encode_sex).transpose()?;
        let income_level = resolve_income(raw);
        let [low, lower_middle, upper_middle] = income_indicators(income_level);

        let mut m = Measurements {
            values: [None; Field::COUNT],
            sex,
            income_level,
        };
        m.set(Field::Sex, sex.map(|s| s.code()));
        m.set(Field::Age, raw.age);
        m.set(Field::Height, raw.height);
        m.set(Field::Weight, raw.weight);
        m.set(Field::HeightForAgeZ, raw.height_for_age_z);
        m.set(Field::WeightForHeightZ, raw.weight_for_height_z);
        m.set(Field::WeightForAgeZ, raw.weight_for_age_z);
        m.set(Field::HeightM, raw.height_m);
        m.set(Field::Bmi, raw.bmi);
        m.set(Field::Whr, raw.whr);
        m.set(Field::IncomeLow, Some(low));
        m.set(Field::IncomeLowerMiddle, Some(lower_middle));
        m.set(Field::IncomeUpperMiddle, Some(upper_middle));

        m.derive();
        Ok(m)
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.values[field.index()]
    }

    fn set(&mut self, field: Field, value: Option<f64>) {
        self.values[field.index()] = value;
    }

    /// Fill a field only if it has no value yet
    fn fill(&mut self, field: Field, value: f64) {
        if self.get(field).is_none() {
            self.set(field, Some(value));
        }
    }

    fn derive(&mut self) {
        let height_cm = match self.get(Field::Height) {
            Some(h) if h > 0.0 => h,
            _ => return,
        };
        self.fill(Field::HeightM, height_cm / 100.0);

        let Some(weight) = self.get(Field::Weight) else {
            return;
        };
        // derived from centimetres even when height_m was supplied
        let height_m = height_cm / 100.0;
        self.fill(Field::Bmi, weight / (height_m * height_m));
        self.fill(Field::Whr, weight / height_cm);
    }
}

/// Ordered numeric features, named by the model manifest
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Build a vector directly; `values` must line up with `names`
    pub fn new(names: Arc<[String]>, values: Vec<f64>) -> Result<Self> {
        if names.len() != values.len() {
            return Err(NutriError::Inference(format!(
                "feature vector has {} values for {} names",
                values.len(),
                names.len()
            )));
        }
        Ok(FeatureVector { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}

/// Maps raw input onto a fixed manifest of feature names
#[derive(Debug, Clone)]
pub struct FeatureReconciler {
    names: Arc<[String]>,
    /// Field filling each manifest column, resolved once
    slots: Vec<Option<Field>>,
}

impl FeatureReconciler {
    pub fn new(names: Arc<[String]>) -> Self {
        let slots = names
            .iter()
            .map(|name| {
                let field = Field::for_manifest_name(name);
                if field.is_none() {
                    log::warn!("Manifest feature {:?} has no input alias", name);
                }
                field
            })
            .collect();
        FeatureReconciler { names, slots }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn reconcile(&self, raw: &RawInput) -> Result<FeatureVector> {
        let measurements = Measurements::from_raw(raw)?;
        self.assemble(&measurements)
    }

    /// Lay out measurements in manifest order, failing on any gap
    pub fn assemble(&self, measurements: &Measurements) -> Result<FeatureVector> {
        let mut values = Vec::with_capacity(self.names.len());
        let mut missing = Vec::new();

        for (name, slot) in self.names.iter().zip(&self.slots) {
            match slot.and_then(|field| measurements.get(field)) {
                Some(value) => values.push(value),
                None => missing.push(name.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(NutriError::MissingFeatures { missing });
        }

        Ok(FeatureVector {
            names: Arc::clone(&self.names),
            values,
        })
    }
}
