//! Error types for the coffee-etl crate.
//!
//! Table-level failures (fetching, parsing, writing) are `EtlError`s and abort
//! the run. Column-level failures are `ColumnCoercionWarning` values that the
//! stage records and recovers from.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl EtlError {
    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }
}

impl From<reqwest::Error> for EtlError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transfer(err.to_string())
    }
}

impl From<figment::Error> for EtlError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// A single column that could not be converted and was left as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCoercionWarning {
    pub column: String,
    pub reason: String,
}

impl ColumnCoercionWarning {
    pub fn new(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ColumnCoercionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "column '{}': {}", self.column, self.reason)
    }
}
