//! Pipeline driver: extract, transform, load.

use crate::config::EtlConfig;
use crate::data::clean::{CleanSummary, clean_table};
use crate::data::features::derive_date_features;
use crate::data::schema::SchemaDefinition;
use crate::data::sink::{SinkReport, write_table};
use crate::data::source::{DataSourceInfo, load_table};
use crate::data::table::Table;
use crate::data::validate::{DataQualityReport, profile_table};
use crate::error::{ColumnCoercionWarning, EtlError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rows shown in the preview logged after a run.
const PREVIEW_ROWS: usize = 5;

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub source: DataSourceInfo,
    pub original_shape: (usize, usize),
    pub raw_quality: DataQualityReport,
    pub final_shape: (usize, usize),
    pub clean: CleanSummary,
    pub date_columns: Vec<String>,
    pub feature_warnings: Vec<ColumnCoercionWarning>,
    pub sink: SinkReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Output of the transform stages, before anything is written.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub table: Table,
    pub clean: CleanSummary,
    pub date_columns: Vec<String>,
    pub feature_warnings: Vec<ColumnCoercionWarning>,
}

/// Runs source -> cleaner -> feature deriver -> sink in order.
pub struct EtlPipeline {
    config: EtlConfig,
    schema: SchemaDefinition,
}

impl EtlPipeline {
    pub fn new(config: EtlConfig) -> Self {
        Self {
            config,
            schema: SchemaDefinition::coffee_survey(),
        }
    }

    pub fn with_schema(mut self, schema: SchemaDefinition) -> Self {
        self.schema = schema;
        self
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Clean and derive features without touching the filesystem.
    pub fn transform(&self, table: Table) -> Transformed {
        let cleaned = clean_table(table, &self.schema);
        tracing::info!("Performing feature engineering...");
        let featured = derive_date_features(cleaned.table, self.config.features.date_detection);
        Transformed {
            table: featured.table,
            clean: cleaned.summary,
            date_columns: featured.date_columns,
            feature_warnings: featured.warnings,
        }
    }

    /// Execute the full run. The first fatal error stops the remaining stages.
    pub async fn run(&self) -> Result<PipelineReport, EtlError> {
        let started_at = Utc::now();
        tracing::info!("Starting ETL pipeline...");

        tracing::info!("Step 1: Extracting data...");
        let (raw, source) =
            load_table(self.config.local_file.as_deref(), &self.config.source).await?;
        let original_shape = raw.shape();
        tracing::info!("Original dataset shape: {original_shape:?}");
        tracing::info!("Columns: {:?}", raw.column_names());
        let raw_quality = profile_table(&raw);
        tracing::debug!(
            missing_cells = raw_quality.total_missing(),
            duplicate_rows = raw_quality.duplicate_rows,
            "Raw data profile"
        );

        tracing::info!("Step 2: Transforming data...");
        let transformed = self.transform(raw);

        tracing::info!("Step 3: Loading data...");
        let output = &self.config.output;
        let sink = write_table(&transformed.table, &output.path, output.format)?;

        let final_shape = transformed.table.shape();
        tracing::info!("ETL pipeline completed!");
        tracing::info!("Final dataset shape: {final_shape:?}");
        tracing::info!(
            bytes = sink.bytes,
            sha256 = %sink.sha256,
            "Processed data saved to: {}",
            sink.path.display()
        );
        tracing::info!(
            "First {PREVIEW_ROWS} rows of processed data:\n{}",
            transformed.table.head(PREVIEW_ROWS)
        );

        Ok(PipelineReport {
            source,
            original_shape,
            raw_quality,
            final_shape,
            clean: transformed.clean,
            date_columns: transformed.date_columns,
            feature_warnings: transformed.feature_warnings,
            sink,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
