//! SQLite storage for child records and their predictions

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::features::{Field, Measurements, RawInput, SexValue};
use crate::predict::PredictionResult;
use crate::{IncomeLevel, NutriError, Result, Sex};

/// Measurements of one child, ready to be stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChild {
    pub name: String,
    pub sex: Sex,
    /// Months
    pub age: f64,
    /// Centimetres
    pub height: f64,
    /// Kilograms
    pub weight: f64,
    pub height_for_age_z: Option<f64>,
    pub weight_for_height_z: Option<f64>,
    pub weight_for_age_z: Option<f64>,
    pub height_m: f64,
    pub bmi: f64,
    pub whr: f64,
    pub income_level: Option<IncomeLevel>,
}

impl NewChild {
    /// Build from submitted input; sex, age, height and weight are required
    pub fn from_input(name: &str, raw: &RawInput) -> Result<Self> {
        let m = Measurements::from_raw(raw)?;

        let mut problems = Vec::new();
        let name = name.trim();
        if name.is_empty() {
            problems.push("name must not be empty".to_string());
        }
        let mut require = |field: Field| {
            let value = m.get(field);
            if value.is_none() {
                problems.push(format!("missing field: {}", field.public_name()));
            }
            value.unwrap_or_default()
        };
        let age = require(Field::Age);
        let height = require(Field::Height);
        let weight = require(Field::Weight);
        let height_m = require(Field::HeightM);
        let bmi = require(Field::Bmi);
        let whr = require(Field::Whr);

        let sex = match m.sex {
            Some(sex) => sex,
            None => {
                problems.push(format!("missing field: {}", Field::Sex.public_name()));
                Sex::Female
            }
        };

        if !problems.is_empty() {
            return Err(NutriError::InvalidInput { problems });
        }

        Ok(NewChild {
            name: name.to_string(),
            sex,
            age,
            height,
            weight,
            height_for_age_z: m.get(Field::HeightForAgeZ),
            weight_for_height_z: m.get(Field::WeightForHeightZ),
            weight_for_age_z: m.get(Field::WeightForAgeZ),
            height_m,
            bmi,
            whr,
            income_level: m.income_level,
        })
    }
}

/// A stored child record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRecord {
    pub id: i64,
    #[serde(flatten)]
    pub child: NewChild,
    pub created_at: DateTime<Utc>,
}

impl ChildRecord {
    /// Rebuild model input from the stored measurements
    pub fn to_input(&self) -> RawInput {
        let c = &self.child;
        RawInput {
            sex: Some(SexValue::Code(c.sex.code())),
            age: Some(c.age),
            height: Some(c.height),
            weight: Some(c.weight),
            height_for_age_z: c.height_for_age_z,
            weight_for_height_z: c.weight_for_height_z,
            weight_for_age_z: c.weight_for_age_z,
            height_m: Some(c.height_m),
            bmi: Some(c.bmi),
            whr: Some(c.whr),
            income_level: c.income_level.map(|level| level.code().to_string()),
            ..Default::default()
        }
    }
}

/// A stored prediction for a child record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPrediction {
    pub id: i64,
    pub child_id: i64,
    #[serde(flatten)]
    pub prediction: PredictionResult,
}

/// Database connection and operations
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS child_health_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                sex TEXT NOT NULL CHECK (sex IN ('Male', 'Female')),
                age REAL NOT NULL,
                height REAL NOT NULL,
                weight REAL NOT NULL,
                height_for_age_z REAL,
                weight_for_height_z REAL,
                weight_for_age_z REAL,
                height_m REAL NOT NULL,
                bmi REAL NOT NULL,
                whr REAL NOT NULL,
                income_level TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS child_health_predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                child_id INTEGER NOT NULL REFERENCES child_health_records(id),
                predicted_class TEXT NOT NULL,
                confidence REAL NOT NULL,
                class_probabilities TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_predictions_child
                ON child_health_predictions(child_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== Child Records ====================

    /// Insert a child record, returning its ID
    pub fn insert_record(&self, child: &NewChild) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO child_health_records (name, sex, age, height, weight,
                height_for_age_z, weight_for_height_z, weight_for_age_z,
                height_m, bmi, whr, income_level, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                child.name,
                child.sex.label(),
                child.age,
                child.height,
                child.weight,
                child.height_for_age_z,
                child.weight_for_height_z,
                child.weight_for_age_z,
                child.height_m,
                child.bmi,
                child.whr,
                child.income_level.map(|level| level.code()),
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        log::debug!("Stored child record {}", id);
        Ok(id)
    }

    /// Get all child records, oldest first
    pub fn get_all_records(&self) -> Result<Vec<ChildRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM child_health_records ORDER BY id",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Get a child record by ID
    pub fn get_record(&self, id: i64) -> Result<ChildRecord> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM child_health_records WHERE id = ?1",
                    RECORD_COLUMNS
                ),
                params![id],
                Self::row_to_record,
            )
            .optional()?
            .ok_or(NutriError::RecordNotFound(id))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ChildRecord> {
        let sex_label: String = row.get(2)?;
        let sex = Sex::from_label(&sex_label).ok_or_else(|| invalid_column(2, &sex_label))?;
        let income: Option<String> = row.get(12)?;
        let created_at: String = row.get(13)?;

        Ok(ChildRecord {
            id: row.get(0)?,
            child: NewChild {
                name: row.get(1)?,
                sex,
                age: row.get(3)?,
                height: row.get(4)?,
                weight: row.get(5)?,
                height_for_age_z: row.get(6)?,
                weight_for_height_z: row.get(7)?,
                weight_for_age_z: row.get(8)?,
                height_m: row.get(9)?,
                bmi: row.get(10)?,
                whr: row.get(11)?,
                income_level: income.as_deref().and_then(IncomeLevel::from_code),
            },
            created_at: parse_timestamp(13, &created_at)?,
        })
    }

    // ==================== Predictions ====================

    /// Store a prediction for an existing child record
    pub fn insert_prediction(&self, child_id: i64, prediction: &PredictionResult) -> Result<i64> {
        let probabilities = serde_json::to_string(&prediction.class_probabilities)
            .map_err(|e| NutriError::Parse(e.to_string()))?;
        self.conn.execute(
            r#"
            INSERT INTO child_health_predictions
                (child_id, predicted_class, confidence, class_probabilities, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                child_id,
                prediction.predicted_class,
                prediction.confidence,
                probabilities,
                prediction.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent prediction stored for a child, if any
    pub fn latest_prediction(&self, child_id: i64) -> Result<Option<StoredPrediction>> {
        let prediction = self
            .conn
            .query_row(
                r#"
                SELECT id, child_id, predicted_class, confidence, class_probabilities, created_at
                FROM child_health_predictions
                WHERE child_id = ?1
                ORDER BY id DESC
                LIMIT 1
                "#,
                params![child_id],
                |row| {
                    let probabilities: String = row.get(4)?;
                    let class_probabilities: BTreeMap<String, f64> =
                        serde_json::from_str(&probabilities)
                            .map_err(|_| invalid_column(4, &probabilities))?;
                    let created_at: String = row.get(5)?;

                    Ok(StoredPrediction {
                        id: row.get(0)?,
                        child_id: row.get(1)?,
                        prediction: PredictionResult {
                            predicted_class: row.get(2)?,
                            confidence: row.get(3)?,
                            class_probabilities,
                            timestamp: parse_timestamp(5, &created_at)?,
                        },
                    })
                },
            )
            .optional()?;
        Ok(prediction)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let record_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM child_health_records", [], |row| {
                    row.get(0)
                })?;

        let prediction_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM child_health_predictions", [], |row| {
                    row.get(0)
                })?;

        let mut stmt = self.conn.prepare(
            "SELECT predicted_class, COUNT(*) FROM child_health_predictions
             GROUP BY predicted_class",
        )?;
        let class_counts = stmt
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok((row.get::<_, String>(0)?, count as usize))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        Ok(DatabaseStats {
            record_count: record_count as usize,
            prediction_count: prediction_count as usize,
            class_counts,
        })
    }
}

const RECORD_COLUMNS: &str = "id, name, sex, age, height, weight, \
    height_for_age_z, weight_for_height_z, weight_for_age_z, \
    height_m, bmi, whr, income_level, created_at";

fn invalid_column(index: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        format!("unexpected value: {}", value).into(),
    )
}

fn parse_timestamp(index: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| invalid_column(index, value))
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub record_count: usize,
    pub prediction_count: usize,
    /// Stored predictions per class
    pub class_counts: BTreeMap<String, usize>,
}
