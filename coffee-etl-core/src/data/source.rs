//! Data source abstraction: a cached local CSV file or the remote survey export.

use crate::config::SourceConfig;
use crate::data::schema::{ColumnType, infer_column_type};
use crate::data::sink::write_csv;
use crate::data::table::{Column, Table, Value};
use crate::error::EtlError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Information about a data source for logging and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: chrono::DateTime<chrono::Utc>,
    pub row_count: Option<usize>,
}

/// Trait for loading a raw table.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Load the full table from this source.
    async fn load(&self) -> Result<Table, EtlError>;

    /// Return metadata about this source.
    fn source_info(&self) -> DataSourceInfo;
}

// ---------------------------------------------------------------------------
// CSV parsing
// ---------------------------------------------------------------------------

/// Parse CSV text into a table, inferring a type for each column.
///
/// Cells equal to one of `null_tokens` become missing. Ragged rows and
/// repeated header names are format errors.
pub fn parse_csv<R: std::io::Read>(reader: R, null_tokens: &[String]) -> Result<Table, EtlError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| EtlError::format(format!("unreadable header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(EtlError::format("missing header row"));
    }

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record.map_err(|e| EtlError::format(e.to_string()))?;
        for (col, field) in record.iter().enumerate() {
            let is_null = null_tokens.iter().any(|t| t == field);
            cells[col].push((!is_null).then(|| field.to_string()));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| typed_column(name, raw))
        .collect();
    Table::new(columns).map_err(|e| EtlError::format(e.to_string()))
}

fn typed_column(name: String, raw: Vec<Option<String>>) -> Column {
    let dtype = infer_column_type(raw.iter().flatten().map(String::as_str));
    let values = raw
        .into_iter()
        .map(|cell| match cell {
            None => Value::Null,
            Some(s) => match dtype {
                ColumnType::Int64 => s.parse().map_or(Value::Null, Value::Int),
                // NaN and infinities parse as floats but are missing cells.
                ColumnType::Float64 => s
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map_or(Value::Null, Value::Float),
                _ => Value::Text(s),
            },
        })
        .collect();
    Column::new(name, dtype, values)
}

// ---------------------------------------------------------------------------
// CsvSource
// ---------------------------------------------------------------------------

/// Local CSV file data source.
pub struct CsvSource {
    pub path: PathBuf,
    pub null_tokens: Vec<String>,
}

#[async_trait]
impl DataSource for CsvSource {
    async fn load(&self) -> Result<Table, EtlError> {
        let content = tokio::fs::read(&self.path).await?;
        parse_csv(content.as_slice(), &self.null_tokens).map_err(|e| match e {
            EtlError::Format(msg) => {
                EtlError::format(format!("{}: {msg}", self.path.display()))
            }
            other => other,
        })
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "csv".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
            row_count: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteCsvSource
// ---------------------------------------------------------------------------

/// CSV export fetched over HTTP. Every failure is a transfer error.
pub struct RemoteCsvSource {
    pub url: String,
    pub null_tokens: Vec<String>,
}

#[async_trait]
impl DataSource for RemoteCsvSource {
    async fn load(&self) -> Result<Table, EtlError> {
        let response = reqwest::get(&self.url).await?;
        if !response.status().is_success() {
            return Err(EtlError::transfer(format!(
                "download failed with status {}",
                response.status()
            )));
        }
        let body = response.bytes().await?;
        parse_csv(body.as_ref(), &self.null_tokens)
            .map_err(|e| EtlError::transfer(format!("downloaded dataset is unreadable: {e}")))
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "remote_csv".to_string(),
            location: self.url.clone(),
            accessed_at: chrono::Utc::now(),
            row_count: None,
        }
    }
}

/// Load the raw table, preferring an existing local copy.
///
/// When `local_file` is given but missing, the remote dataset is fetched and
/// saved there before returning.
pub async fn load_table(
    local_file: Option<&Path>,
    config: &SourceConfig,
) -> Result<(Table, DataSourceInfo), EtlError> {
    if let Some(path) = local_file.filter(|p| p.exists()) {
        tracing::info!("Loading dataset from local file: {}", path.display());
        let source = CsvSource {
            path: path.to_path_buf(),
            null_tokens: config.null_tokens.clone(),
        };
        return load_from(&source).await;
    }

    tracing::info!("Loading dataset from remote source...");
    let source = RemoteCsvSource {
        url: config.url(),
        null_tokens: config.null_tokens.clone(),
    };
    let (table, info) = load_from(&source).await?;
    tracing::info!("Dataset loaded successfully!");

    if let Some(path) = local_file {
        write_csv(&table, path)?;
        tracing::info!("Dataset saved locally to: {}", path.display());
    }
    Ok((table, info))
}

async fn load_from(source: &dyn DataSource) -> Result<(Table, DataSourceInfo), EtlError> {
    let table = source.load().await?;
    let mut info = source.source_info();
    info.row_count = Some(table.row_count());
    let (rows, cols) = table.shape();
    tracing::info!("Dataset shape: ({rows}, {cols})");
    Ok((table, info))
}
