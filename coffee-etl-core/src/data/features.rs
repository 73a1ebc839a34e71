//! Date column detection and calendar feature derivation.

use crate::data::schema::{ColumnType, is_label_column};
use crate::data::table::{Column, Table, Value};
use crate::error::ColumnCoercionWarning;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// How eagerly text is recognised as a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateDetection {
    /// Purely numeric tokens are never dates.
    #[default]
    Strict,
    /// Any value that parses counts, including compact `YYYYMMDD` numbers.
    Lenient,
}

static NUMERIC: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[+-]?\d+(\.\d+)?$").expect("numeric token pattern is valid")
});

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a single cell as a calendar date.
pub fn parse_date(raw: &str, mode: DateDetection) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if NUMERIC.is_match(s) {
        return match mode {
            DateDetection::Strict => None,
            DateDetection::Lenient => parse_compact(s),
        };
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

fn parse_compact(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn cell_date(value: &Value, mode: DateDetection) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::Text(s) => parse_date(s, mode),
        _ => None,
    }
}

/// True when at least one value of the column parses as a date.
pub fn looks_like_date_column(values: &[Value], mode: DateDetection) -> bool {
    values.iter().any(|v| cell_date(v, mode).is_some())
}

/// Result of feature derivation.
#[derive(Debug, Clone)]
pub struct FeatureOutcome {
    pub table: Table,
    pub date_columns: Vec<String>,
    pub warnings: Vec<ColumnCoercionWarning>,
}

/// Convert date-like text columns to dates and append `_year`, `_month`, `_day` columns.
pub fn derive_date_features(table: Table, mode: DateDetection) -> FeatureOutcome {
    let candidates: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| c.dtype == ColumnType::Text && !is_label_column(&c.name))
        .filter(|c| looks_like_date_column(&c.values, mode))
        .map(|c| c.name.clone())
        .collect();

    let mut table = table;
    let mut date_columns = Vec::new();
    let mut warnings = Vec::new();

    for name in candidates {
        match expand_date_column(&table, &name, mode) {
            Ok(expanded) => {
                tracing::info!("  - Created date features for '{name}'");
                table = expanded;
                date_columns.push(name);
            }
            Err(reason) => {
                let warning = ColumnCoercionWarning::new(name, reason);
                tracing::warn!("Skipping date features for {warning}");
                warnings.push(warning);
            }
        }
    }

    FeatureOutcome {
        table,
        date_columns,
        warnings,
    }
}

fn expand_date_column(table: &Table, name: &str, mode: DateDetection) -> Result<Table, String> {
    let mut columns = table.columns().to_vec();
    let idx = columns
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| format!("column '{name}' disappeared"))?;

    let dates: Vec<Option<NaiveDate>> = columns[idx]
        .values
        .iter()
        .map(|v| cell_date(v, mode))
        .collect();
    let parsed = dates.iter().flatten().count();
    if parsed * 2 < dates.len() {
        tracing::warn!(
            column = name,
            parsed,
            total = dates.len(),
            "Low-confidence date column: most values are not dates"
        );
    }

    let component = |suffix: &str, get: fn(&NaiveDate) -> i64| {
        let values = dates
            .iter()
            .map(|d| d.as_ref().map_or(Value::Null, |d| Value::Int(get(d))))
            .collect();
        Column::new(format!("{name}_{suffix}"), ColumnType::Int32, values)
    };
    let year = component("year", |d| d.year() as i64);
    let month = component("month", |d| d.month() as i64);
    let day = component("day", |d| d.day() as i64);

    columns[idx] = Column::new(
        name,
        ColumnType::Date,
        dates.iter().map(|d| d.map_or(Value::Null, Value::Date)).collect(),
    );
    columns.extend([year, month, day]);
    Table::new(columns).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(values: &[&str]) -> Vec<Value> {
        values.iter().map(|s| Value::text(*s)).collect()
    }

    #[test]
    fn test_parse_date_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 15);
        for s in [
            "2024-02-15",
            "2024/02/15",
            "02/15/2024",
            "15.02.2024",
            "2024-02-15 08:30:00",
            "2024-02-15T08:30:00",
            "2024-02-15T08:30:00+02:00",
        ] {
            assert_eq!(parse_date(s, DateDetection::Strict), expected, "{s}");
        }
        assert_eq!(parse_date("invalid", DateDetection::Lenient), None);
    }

    #[test]
    fn test_numeric_tokens_depend_on_mode() {
        assert_eq!(parse_date("20240215", DateDetection::Strict), None);
        assert_eq!(
            parse_date("20240215", DateDetection::Lenient),
            NaiveDate::from_ymd_opt(2024, 2, 15)
        );
        assert_eq!(parse_date("42", DateDetection::Lenient), None);
    }

    #[test]
    fn test_predicate_needs_one_parse() {
        assert!(looks_like_date_column(
            &texts(&["nope", "2024-01-01"]),
            DateDetection::Strict
        ));
        assert!(!looks_like_date_column(
            &texts(&["nope", "still no"]),
            DateDetection::Lenient
        ));
        assert!(!looks_like_date_column(
            &texts(&["20240101", "20240102"]),
            DateDetection::Strict
        ));
        assert!(looks_like_date_column(
            &texts(&["20240101", "20240102"]),
            DateDetection::Lenient
        ));
    }

    #[test]
    fn test_survey_date_expansion() {
        let table = Table::new(vec![Column::new(
            "Survey_Date",
            ColumnType::Text,
            texts(&["2024-01-01", "2024-02-15", "invalid"]),
        )])
        .unwrap();
        let out = derive_date_features(table, DateDetection::Strict);
        assert_eq!(out.date_columns, vec!["Survey_Date".to_string()]);
        assert_eq!(out.table.column_count(), 4);

        let col = |n: &str| out.table.column(n).unwrap().values.clone();
        assert_eq!(
            col("Survey_Date_year"),
            vec![Value::Int(2024), Value::Int(2024), Value::Null]
        );
        assert_eq!(
            col("Survey_Date_month"),
            vec![Value::Int(1), Value::Int(2), Value::Null]
        );
        assert_eq!(
            col("Survey_Date_day"),
            vec![Value::Int(1), Value::Int(15), Value::Null]
        );
        let original = out.table.column("Survey_Date").unwrap();
        assert_eq!(original.dtype, ColumnType::Date);
        assert!(original.values[2].is_null());
    }

    #[test]
    fn test_label_and_non_text_columns_skipped() {
        let table = Table::new(vec![
            Column::new("Country", ColumnType::Text, texts(&["2024-01-01"])),
            Column::new("Visit", ColumnType::Category, texts(&["2024-01-01"])),
            Column::new("Note", ColumnType::Text, texts(&["hello"])),
        ])
        .unwrap();
        let before = table.clone();
        let out = derive_date_features(table, DateDetection::Lenient);
        assert!(out.date_columns.is_empty());
        assert_eq!(out.table, before);
    }

    #[test]
    fn test_name_collision_is_warned_and_skipped() {
        let table = Table::new(vec![
            Column::new("Joined", ColumnType::Text, texts(&["2024-03-01"])),
            Column::new("Joined_year", ColumnType::Int32, vec![Value::Int(1999)]),
        ])
        .unwrap();
        let before = table.clone();
        let out = derive_date_features(table, DateDetection::Strict);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].column, "Joined");
        assert_eq!(out.table, before);
    }
}
