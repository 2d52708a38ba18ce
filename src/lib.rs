//! Malnutrition risk classification
//!
//! Reconciles anthropometric measurements into the feature vector a trained
//! classifier expects and serves its predictions over HTTP.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod server;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Sex of the child, encoded for the model as 1 = male, 0 = female
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Numeric encoding used by the trained model
    pub fn code(&self) -> f64 {
        match self {
            Sex::Male => 1.0,
            Sex::Female => 0.0,
        }
    }

    pub fn from_code(code: f64) -> Option<Self> {
        if code == 1.0 {
            Some(Sex::Male)
        } else if code == 0.0 {
            Some(Sex::Female)
        } else {
            None
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "male" => Some(Sex::Male),
            "female" => Some(Sex::Female),
            _ => None,
        }
    }

    /// Label stored alongside persisted records
    pub fn label(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Household income bracket, one-hot encoded into three indicator features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeLevel {
    Low,
    LowerMiddle,
    UpperMiddle,
}

impl IncomeLevel {
    pub const ALL: [IncomeLevel; 3] = [
        IncomeLevel::Low,
        IncomeLevel::LowerMiddle,
        IncomeLevel::UpperMiddle,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            IncomeLevel::Low => "low",
            IncomeLevel::LowerMiddle => "lower_middle",
            IncomeLevel::UpperMiddle => "upper_middle",
        }
    }

    /// Parse a bracket name, ignoring case and accepting `-` or a space for `_`
    pub fn from_code(code: &str) -> Option<Self> {
        let normalized: String = code
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "low" => Some(IncomeLevel::Low),
            "lower_middle" => Some(IncomeLevel::LowerMiddle),
            "upper_middle" => Some(IncomeLevel::UpperMiddle),
            _ => None,
        }
    }
}

impl fmt::Display for IncomeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum NutriError {
    #[error("Missing required features: {}", missing.join(", "))]
    MissingFeatures { missing: Vec<String> },

    #[error("Invalid value for {field}: {value}")]
    InvalidCategorical { field: String, value: String },

    #[error("Invalid input: {}", problems.join("; "))]
    InvalidInput { problems: Vec<String> },

    #[error("Model unavailable at {}: {reason}", path.display())]
    ModelUnavailable { path: PathBuf, reason: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Child record not found with ID: {0}")]
    RecordNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl NutriError {
    /// True for errors caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NutriError::MissingFeatures { .. }
                | NutriError::InvalidCategorical { .. }
                | NutriError::InvalidInput { .. }
                | NutriError::RecordNotFound(_)
        )
    }

    /// Human-readable list of individual problems, for structured responses
    pub fn details(&self) -> Vec<String> {
        match self {
            NutriError::MissingFeatures { missing } => missing
                .iter()
                .map(|name| format!("missing feature: {}", name))
                .collect(),
            NutriError::InvalidInput { problems } => problems.clone(),
            other => vec![other.to_string()],
        }
    }
}

pub type Result<T> = std::result::Result<T, NutriError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Directory holding classifier.json, feature_names.json, class_names.json
    pub artifact_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    /// Store predictions made through POST /api/children
    pub persist_predictions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            model: ModelConfig {
                artifact_dir: "model_files".to_string(),
            },
            data: DataConfig {
                database_path: "data/nutriguard.db".to_string(),
                persist_predictions: true,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NutriError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| NutriError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NutriError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
