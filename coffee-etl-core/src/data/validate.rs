//! Data quality profiling: missing cells and duplicate rows.

use crate::data::table::{Table, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Missing-cell count for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingCount {
    pub column: String,
    pub missing: usize,
}

/// A data quality report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub total_rows: usize,
    pub total_columns: usize,
    /// Only columns with at least one missing cell, in table order.
    pub missing: Vec<MissingCount>,
    pub duplicate_rows: usize,
}

impl DataQualityReport {
    pub fn total_missing(&self) -> usize {
        self.missing.iter().map(|m| m.missing).sum()
    }

    pub fn missing_percentage(&self, column: &str) -> f64 {
        if self.total_rows == 0 {
            return 0.0;
        }
        self.missing
            .iter()
            .find(|m| m.column == column)
            .map_or(0.0, |m| m.missing as f64 / self.total_rows as f64 * 100.0)
    }
}

/// Profile a table.
pub fn profile_table(table: &Table) -> DataQualityReport {
    let missing = table
        .columns()
        .iter()
        .map(|c| MissingCount {
            column: c.name.clone(),
            missing: c.null_count(),
        })
        .filter(|m| m.missing > 0)
        .collect();
    let duplicate_rows = first_occurrence_mask(table).iter().filter(|k| !**k).count();

    DataQualityReport {
        total_rows: table.row_count(),
        total_columns: table.column_count(),
        missing,
        duplicate_rows,
    }
}

/// `true` for each row that is the first occurrence of its exact values.
pub fn first_occurrence_mask(table: &Table) -> Vec<bool> {
    let mut seen: HashSet<Vec<&Value>> = HashSet::with_capacity(table.row_count());
    (0..table.row_count())
        .map(|i| seen.insert(table.row(i)))
        .collect()
}
