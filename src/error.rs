use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration, schema, IO and object-store failures.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("missing column '{0}'")]
    MissingColumn(String),
    #[error("column '{column}' row {row}: '{value}' is not numeric")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("row {row} has {found} values but the header has {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unsupported file extension: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("no input files match '{0}'")]
    NoInputFiles(String),
    #[error("invalid object key '{0}'")]
    InvalidKey(String),
    #[error("object '{key}' not found in bucket '{bucket}'")]
    ObjectNotFound { bucket: String, key: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CleanError>;
