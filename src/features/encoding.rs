//! Categorical encoding for sex and income bracket

use super::input::{RawInput, SexValue};
use crate::{IncomeLevel, NutriError, Result, Sex};

/// Normalize a sex value. Unlike income, an unrecognised sex is an error.
pub fn encode_sex(value: &SexValue) -> Result<Sex> {
    let sex = match value {
        SexValue::Code(code) => Sex::from_code(*code),
        SexValue::Label(label) => Sex::from_label(label),
    };
    sex.ok_or_else(|| NutriError::InvalidCategorical {
        field: "sex".to_string(),
        value: value.to_string(),
    })
}

/// Resolve the income bracket from the label, or from one-hot flags when no
/// label was given. Anything unrecognised resolves to no bracket.
pub fn resolve_income(raw: &RawInput) -> Option<IncomeLevel> {
    if let Some(label) = &raw.income_level {
        let level = IncomeLevel::from_code(label);
        if level.is_none() {
            log::debug!("Unrecognised income level {:?}, using no bracket", label);
        }
        return level;
    }

    let flags = [
        raw.income_low,
        raw.income_lower_middle,
        raw.income_upper_middle,
    ];
    let set: Vec<usize> = flags
        .iter()
        .enumerate()
        .filter(|(_, flag)| flag.is_some_and(|v| v == 1.0))
        .map(|(i, _)| i)
        .collect();

    match set.as_slice() {
        [only] => Some(IncomeLevel::ALL[*only]),
        [] => None,
        _ => {
            log::debug!("Conflicting income flags {:?}, using no bracket", flags);
            None
        }
    }
}

/// One-hot indicators in `IncomeLevel::ALL` order
pub fn income_indicators(level: Option<IncomeLevel>) -> [f64; 3] {
    let mut indicators = [0.0; 3];
    if let Some(level) = level {
        if let Some(pos) = IncomeLevel::ALL.iter().position(|l| *l == level) {
            indicators[pos] = 1.0;
        }
    }
    indicators
}
