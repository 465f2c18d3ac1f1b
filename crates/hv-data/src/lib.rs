//! Row ingestion, deduplication and ranking for the hit visualizer

pub mod aggregate;
pub mod config;
pub mod rows;
pub mod schema;
pub mod sources;

use tokio::task::JoinError;
use thiserror::Error;

// Re-exports
pub use aggregate::{aggregate, Aggregation, AggregationParams, TopEntry, Unique};
pub use config::{ColumnRules, NullConfig};
pub use rows::{key_for, Row, RowStore, StructuralClass, SYNTHESIZED_KEY_PREFIX, TRI_AXIS, UNKNOWN_LIBRARY};
pub use schema::{ColumnLayout, SchemaDetector};
pub use sources::CsvRowSource;

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => DataError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => DataError::Csv(error.to_string()),
        }
    }
}

/// Input does not have the shape the dashboard needs; nothing is committed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("The file is empty or contains no valid data")]
    EmptyInput,

    #[error("No {kind} column was found (expected {pattern})")]
    MissingColumns { kind: &'static str, pattern: &'static str },

    #[error("Unknown rank metric: {0}")]
    UnknownMetric(String),
}
