//! Storage of submitted child records and their predictions

pub mod database;

pub use database::{ChildRecord, Database, DatabaseStats, NewChild, StoredPrediction};
