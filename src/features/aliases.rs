//! Static alias table between public field names and model column names

/// A quantity the reconciler knows how to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Sex,
    Age,
    Height,
    Weight,
    HeightForAgeZ,
    WeightForHeightZ,
    WeightForAgeZ,
    HeightM,
    Bmi,
    Whr,
    IncomeLow,
    IncomeLowerMiddle,
    IncomeUpperMiddle,
}

/// Public name and accepted manifest names for every field
const ALIASES: &[(Field, &str, &[&str])] = &[
    (Field::Sex, "sex", &["Sex", "Sex_1", "sex"]),
    (Field::Age, "age", &["Age", "age"]),
    (Field::Height, "height", &["Height", "height"]),
    (Field::Weight, "weight", &["Weight", "weight"]),
    (
        Field::HeightForAgeZ,
        "height_for_age_z",
        &["Height-for-age (Mean Z-score)", "height_for_age_z"],
    ),
    (
        Field::WeightForHeightZ,
        "weight_for_height_z",
        &["Weight-for-height (Mean Z-score)", "weight_for_height_z"],
    ),
    (
        Field::WeightForAgeZ,
        "weight_for_age_z",
        &["Weight-for-age (Mean Z-score)", "weight_for_age_z"],
    ),
    (Field::HeightM, "height_m", &["Height_m", "height_m"]),
    (Field::Bmi, "bmi", &["BMI", "bmi"]),
    (Field::Whr, "whr", &["WHR", "whr"]),
    (Field::IncomeLow, "income_low", &["Low Income"]),
    (
        Field::IncomeLowerMiddle,
        "income_lower_middle",
        &["Lower Middle Income"],
    ),
    (
        Field::IncomeUpperMiddle,
        "income_upper_middle",
        &["Upper Middle Income"],
    ),
];

impl Field {
    pub const COUNT: usize = 13;

    pub const ALL: [Field; Field::COUNT] = [
        Field::Sex,
        Field::Age,
        Field::Height,
        Field::Weight,
        Field::HeightForAgeZ,
        Field::WeightForHeightZ,
        Field::WeightForAgeZ,
        Field::HeightM,
        Field::Bmi,
        Field::Whr,
        Field::IncomeLow,
        Field::IncomeLowerMiddle,
        Field::IncomeUpperMiddle,
    ];

    /// Position in `Field::ALL`, used as a slot index
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Name in the public input schema
    pub fn public_name(&self) -> &'static str {
        ALIASES[self.index()].1
    }

    /// Column names a trained model may use for this field
    pub fn manifest_names(&self) -> &'static [&'static str] {
        ALIASES[self.index()].2
    }

    /// Resolve a manifest column name to the field that fills it
    pub fn for_manifest_name(name: &str) -> Option<Field> {
        ALIASES
            .iter()
            .find(|(_, _, names)| names.contains(&name))
            .map(|(field, _, _)| *field)
    }
}
