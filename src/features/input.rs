//! Caller-facing measurement record
//!
//! Accepts the canonical snake_case names plus the capitalised column names
//! of the training set, so records exported from either side deserialize.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sex as supplied by the caller: a 0/1 code or a textual label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SexValue {
    Code(f64),
    Label(String),
}

impl fmt::Display for SexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SexValue::Code(code) => write!(f, "{}", code),
            SexValue::Label(label) => write!(f, "{}", label),
        }
    }
}

impl From<i32> for SexValue {
    fn from(code: i32) -> Self {
        SexValue::Code(code as f64)
    }
}

impl From<&str> for SexValue {
    fn from(label: &str) -> Self {
        SexValue::Label(label.to_string())
    }
}

/// Anthropometric measurements for one child, as received.
///
/// Only `sex`, `age`, `height` and `weight` are always expected; everything
/// else is optional and may be derived during reconciliation. Age is in
/// months.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    #[serde(default, alias = "Sex", alias = "Sex_1")]
    pub sex: Option<SexValue>,
    #[serde(default, alias = "Age")]
    pub age: Option<f64>,
    /// Height in centimetres
    #[serde(default, alias = "Height")]
    pub height: Option<f64>,
    /// Weight in kilograms
    #[serde(default, alias = "Weight")]
    pub weight: Option<f64>,
    #[serde(default, alias = "Height-for-age (Mean Z-score)")]
    pub height_for_age_z: Option<f64>,
    #[serde(default, alias = "Weight-for-height (Mean Z-score)")]
    pub weight_for_height_z: Option<f64>,
    #[serde(default, alias = "Weight-for-age (Mean Z-score)")]
    pub weight_for_age_z: Option<f64>,
    #[serde(default, alias = "Height_m")]
    pub height_m: Option<f64>,
    #[serde(default, alias = "BMI")]
    pub bmi: Option<f64>,
    #[serde(default, alias = "WHR")]
    pub whr: Option<f64>,
    #[serde(default, alias = "IncomeLevel")]
    pub income_level: Option<String>,
    /// One-hot income flags, used only when `income_level` is absent
    #[serde(default, alias = "Low Income")]
    pub income_low: Option<f64>,
    #[serde(default, alias = "Lower Middle Income")]
    pub income_lower_middle: Option<f64>,
    #[serde(default, alias = "Upper Middle Income")]
    pub income_upper_middle: Option<f64>,
}

impl RawInput {
    /// The required core measurements
    pub fn new(sex: impl Into<SexValue>, age: f64, height: f64, weight: f64) -> Self {
        RawInput {
            sex: Some(sex.into()),
            age: Some(age),
            height: Some(height),
            weight: Some(weight),
            ..Default::default()
        }
    }

    pub fn with_z_scores(
        mut self,
        height_for_age: f64,
        weight_for_height: f64,
        weight_for_age: f64,
    ) -> Self {
        self.height_for_age_z = Some(height_for_age);
        self.weight_for_height_z = Some(weight_for_height);
        self.weight_for_age_z = Some(weight_for_age);
        self
    }

    pub fn with_income_level(mut self, level: &str) -> Self {
        self.income_level = Some(level.to_string());
        self
    }

    /// Every supplied numeric field with its public name
    pub fn numeric_fields(&self) -> Vec<(&'static str, f64)> {
        let mut fields = Vec::new();
        if let Some(SexValue::Code(code)) = &self.sex {
            fields.push(("sex", *code));
        }
        let candidates = [
            ("age", self.age),
            ("height", self.height),
            ("weight", self.weight),
            ("height_for_age_z", self.height_for_age_z),
            ("weight_for_height_z", self.weight_for_height_z),
            ("weight_for_age_z", self.weight_for_age_z),
            ("height_m", self.height_m),
            ("bmi", self.bmi),
            ("whr", self.whr),
            ("income_low", self.income_low),
            ("income_lower_middle", self.income_lower_middle),
            ("income_upper_middle", self.income_upper_middle),
        ];
        fields.extend(
            candidates
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v))),
        );
        fields
    }
}
