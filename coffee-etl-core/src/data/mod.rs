//! Data pipeline stages: source, cleaning, typing, features, sink.

pub mod clean;
pub mod features;
pub mod impute;
pub mod normalize;
pub mod schema;
pub mod sink;
pub mod source;
pub mod table;
pub mod validate;

pub use clean::{CleanOutcome, CleanSummary, clean_table, drop_duplicates};
pub use features::{DateDetection, FeatureOutcome, derive_date_features, looks_like_date_column};
pub use normalize::{NormalizeOutcome, normalize_types};
pub use schema::{ColumnSchema, ColumnType, SchemaDefinition};
pub use sink::{OutputFormat, SinkReport, read_csv, read_parquet, write_table};
pub use source::{CsvSource, DataSource, DataSourceInfo, RemoteCsvSource, load_table};
pub use table::{Column, Table, Value};
pub use validate::{DataQualityReport, profile_table};
