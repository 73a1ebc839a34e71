//! Column types, raw type inference, and the fixed coffee survey schema.

use serde::{Deserialize, Serialize};

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int32,
    Int64,
    Float64,
    Text,
    Category,
    Date,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Text => "text",
            Self::Category => "category",
            Self::Date => "date",
        };
        f.write_str(name)
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, dtype: ColumnType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }

    /// Schema names are lowercase; dataset headers are not.
    pub fn matches(&self, column: &str) -> bool {
        self.name.eq_ignore_ascii_case(column)
    }
}

/// Schema definition for a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub columns: Vec<ColumnSchema>,
}

impl SchemaDefinition {
    /// The expected columns of the coffee consumption survey.
    pub fn coffee_survey() -> Self {
        use ColumnType::*;
        let columns = [
            ("id", Int64),
            ("age", Int32),
            ("gender", Category),
            ("country", Category),
            ("coffee_intake", Float64),
            ("caffeine_mg", Float64),
            ("sleep_hours", Float64),
            ("sleep_quality", Category),
            ("bmi", Float64),
            ("heart_rate", Int32),
            ("stress_level", Category),
            ("physical_activity_hours", Float64),
            ("health_issues", Category),
            ("occupation", Category),
            ("smoking", Int32),
            ("alcohol_consumption", Int32),
        ]
        .into_iter()
        .map(|(name, dtype)| ColumnSchema::new(name, dtype))
        .collect();
        Self { columns }
    }

    pub fn lookup(&self, column: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.matches(column))
    }
}

impl Default for SchemaDefinition {
    fn default() -> Self {
        Self::coffee_survey()
    }
}

/// Columns that hold labels and are never considered as date candidates.
pub const LABEL_COLUMNS: &[&str] = &["gender", "country", "occupation"];

pub fn is_label_column(column: &str) -> bool {
    LABEL_COLUMNS.iter().any(|l| l.eq_ignore_ascii_case(column))
}

/// Infer a column type from the non-null raw cells of a CSV column.
pub fn infer_column_type<'a>(cells: impl IntoIterator<Item = &'a str>) -> ColumnType {
    let mut seen = false;
    let mut all_int = true;
    let mut all_float = true;

    for cell in cells {
        seen = true;
        if all_int && cell.parse::<i64>().is_err() {
            all_int = false;
        }
        if cell.parse::<f64>().is_err() {
            all_float = false;
            break;
        }
    }

    if !seen {
        return ColumnType::Text;
    }
    if all_int {
        return ColumnType::Int64;
    }
    if all_float {
        return ColumnType::Float64;
    }
    ColumnType::Text
}
