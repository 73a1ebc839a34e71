//! # coffee-etl — cleaning pipeline for the coffee consumption survey
//!
//! Loads the raw survey export (from a cached CSV or the published remote
//! copy), fills missing values, normalizes column types against a fixed
//! schema, derives calendar features from date-like text columns, removes
//! duplicate rows, and writes the result as CSV or Parquet.
//!
//! Every stage takes a [`Table`] and returns a new one. Column-level problems
//! are recovered in place and reported as [`ColumnCoercionWarning`]s;
//! table-level I/O problems are [`EtlError`]s.

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;

pub use config::{CliOverrides, EtlConfig, load_config};
pub use data::{Column, ColumnType, SchemaDefinition, Table, Value};
pub use error::{ColumnCoercionWarning, EtlError};
pub use pipeline::{EtlPipeline, PipelineReport};
