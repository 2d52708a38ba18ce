//! Plausibility checks on submitted measurements

use super::input::RawInput;
use crate::{NutriError, Result};

/// Age range in months covered by the model (children under five)
pub const AGE_MONTHS: (f64, f64) = (0.0, 60.0);
/// Height range in centimetres
pub const HEIGHT_CM: (f64, f64) = (30.0, 250.0);
/// Weight range in kilograms
pub const WEIGHT_KG: (f64, f64) = (0.5, 500.0);

/// Check supplied values against plausible ranges, reporting every problem
/// at once. Absent fields are not checked here.
pub fn validate_ranges(raw: &RawInput) -> Result<()> {
    let mut problems = Vec::new();

    for (name, value) in raw.numeric_fields() {
        if !value.is_finite() {
            problems.push(format!("{} must be a finite number", name));
        }
    }

    let checks = [
        ("Age", raw.age, AGE_MONTHS, "months"),
        ("Height", raw.height, HEIGHT_CM, "cm"),
        ("Weight", raw.weight, WEIGHT_KG, "kg"),
    ];
    for (label, value, (min, max), unit) in checks {
        if let Some(v) = value {
            if v.is_finite() && (v < min || v > max) {
                problems.push(format!(
                    "{} must be between {} and {} {}",
                    label, min, max, unit
                ));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(NutriError::InvalidInput { problems })
    }
}
