//! Cleaner: generic imputation, schema normalization, and deduplication.

use crate::data::impute::impute_column;
use crate::data::normalize::normalize_types;
use crate::data::schema::SchemaDefinition;
use crate::data::table::Table;
use crate::data::validate::{MissingCount, first_occurrence_mask};
use crate::error::ColumnCoercionWarning;
use serde::{Deserialize, Serialize};

/// Result of cleaning a table.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub table: Table,
    pub summary: CleanSummary,
}

/// What the cleaner changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanSummary {
    pub missing: Vec<MissingCount>,
    pub duplicates_removed: usize,
    pub warnings: Vec<ColumnCoercionWarning>,
}

/// Fill every missing cell, normalize schema columns, then drop duplicate rows.
pub fn clean_table(table: Table, schema: &SchemaDefinition) -> CleanOutcome {
    tracing::info!("Handling missing values...");
    let mut missing = Vec::new();
    let imputed = table.map_columns(|column| {
        let (filled, count) = impute_column(&column);
        if count > 0 {
            tracing::info!("  - Column '{}': {count} missing values", column.name);
            missing.push(MissingCount {
                column: column.name,
                missing: count,
            });
        }
        filled
    });

    let normalized = normalize_types(imputed, schema);

    let (table, duplicates_removed) = drop_duplicates(normalized.table);
    if duplicates_removed > 0 {
        tracing::info!("Removed {duplicates_removed} duplicate rows");
    }

    CleanOutcome {
        table,
        summary: CleanSummary {
            missing,
            duplicates_removed,
            warnings: normalized.warnings,
        },
    }
}

/// Remove rows that repeat an earlier row exactly. Returns the table and the number removed.
pub fn drop_duplicates(table: Table) -> (Table, usize) {
    let keep = first_occurrence_mask(&table);
    let removed = keep.iter().filter(|k| !**k).count();
    if removed == 0 {
        return (table, 0);
    }
    (table.retain_rows(&keep), removed)
}
