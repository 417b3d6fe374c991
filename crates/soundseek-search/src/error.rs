use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("features table {path} has no `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("features table {0} has no rows")]
    EmptyTable(PathBuf),

    #[error("features table {0} has no numeric feature columns")]
    NoFeatureColumns(PathBuf),

    #[error("vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Sample not found: {0}")]
    SampleNotFound(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
