//! Schema-driven type normalization.
//!
//! Each schema column present in the table is imputed and coerced on its own.
//! A column that cannot be converted is reported and kept unchanged.

use crate::data::features::{DateDetection, parse_date};
use crate::data::impute::{UNKNOWN_LABEL, fill_value, median, mode};
use crate::data::schema::{ColumnType, SchemaDefinition};
use crate::data::table::{Column, Table, Value};
use crate::error::ColumnCoercionWarning;

/// Result of normalizing a table against a schema.
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub table: Table,
    pub warnings: Vec<ColumnCoercionWarning>,
}

/// Impute and coerce every schema column present in `table`.
pub fn normalize_types(table: Table, schema: &SchemaDefinition) -> NormalizeOutcome {
    let mut warnings = Vec::new();
    let table = table.map_columns(|column| {
        let Some(entry) = schema.lookup(&column.name) else {
            return column;
        };
        match coerce_column(&column, entry.dtype) {
            Ok(coerced) => {
                tracing::debug!(
                    column = %column.name,
                    from = %column.dtype,
                    to = %coerced.dtype,
                    "Normalized column type"
                );
                coerced
            }
            Err(reason) => {
                let warning = ColumnCoercionWarning::new(column.name.clone(), reason);
                tracing::warn!("Could not convert {warning}; keeping original values");
                warnings.push(warning);
                column
            }
        }
    });
    NormalizeOutcome { table, warnings }
}

/// Convert one column to `target`, filling missing and unparsable cells.
pub fn coerce_column(column: &Column, target: ColumnType) -> Result<Column, String> {
    let values = match target {
        ColumnType::Int32 => coerce_integer(&column.values, i32::MIN as i64, i32::MAX as i64)?,
        ColumnType::Int64 => coerce_integer(&column.values, i64::MIN, i64::MAX)?,
        ColumnType::Float64 => coerce_float(&column.values),
        ColumnType::Text | ColumnType::Category => coerce_label(&column.values),
        ColumnType::Date => coerce_date(&column.values)?,
    };
    Ok(Column::new(column.name.clone(), target, values))
}

fn coerce_integer(values: &[Value], min: i64, max: i64) -> Result<Vec<Value>, String> {
    let fill = median(values).map_or(0, |m| m.floor() as i64);
    values
        .iter()
        .map(|v| {
            let n = match v {
                Value::Int(i) => *i,
                other => match other.as_f64() {
                    // Numeric casts truncate toward zero.
                    Some(f) if f.trunc() >= min as f64 && f.trunc() <= max as f64 => {
                        f.trunc() as i64
                    }
                    Some(f) => return Err(format!("value {f} does not fit the target range")),
                    None => fill,
                },
            };
            if n < min || n > max {
                return Err(format!("value {n} does not fit the target range"));
            }
            Ok(Value::Int(n))
        })
        .collect()
}

fn coerce_float(values: &[Value]) -> Vec<Value> {
    let fill = fill_value(values, ColumnType::Float64);
    values
        .iter()
        .map(|v| v.as_f64().map_or_else(|| fill.clone(), Value::Float))
        .collect()
}

fn coerce_label(values: &[Value]) -> Vec<Value> {
    let fill = mode(values).map_or_else(|| UNKNOWN_LABEL.to_string(), |v| v.render());
    values
        .iter()
        .map(|v| match v {
            Value::Null => Value::Text(fill.clone()),
            other => Value::Text(other.render()),
        })
        .collect()
}

fn coerce_date(values: &[Value]) -> Result<Vec<Value>, String> {
    let parsed: Vec<Option<chrono::NaiveDate>> = values
        .iter()
        .map(|v| match v {
            Value::Date(d) => Some(*d),
            Value::Text(s) => parse_date(s, DateDetection::Strict),
            _ => None,
        })
        .collect();
    let dates: Vec<Value> = parsed.iter().flatten().map(|d| Value::Date(*d)).collect();
    let Some(fill) = mode(&dates) else {
        return Err("no value parses as a date".to_string());
    };
    Ok(parsed
        .into_iter()
        .map(|d| d.map_or_else(|| fill.clone(), Value::Date))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(columns: Vec<Column>) -> Table {
        Table::new(columns).unwrap()
    }

    #[test]
    fn test_numeric_text_is_parsed_and_filled() {
        let input = table(vec![Column::new(
            "Sleep_Hours",
            ColumnType::Text,
            vec![Value::text("6.5"), Value::text("n/a-ish"), Value::text("7.5")],
        )]);
        let out = normalize_types(input, &SchemaDefinition::coffee_survey());
        let col = &out.table.columns()[0];
        assert_eq!(col.dtype, ColumnType::Float64);
        assert_eq!(
            col.values,
            vec![Value::Float(6.5), Value::Float(7.0), Value::Float(7.5)]
        );
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_integer_target_truncates_floats() {
        let input = table(vec![Column::new(
            "age",
            ColumnType::Float64,
            vec![Value::Float(25.9), Value::Null, Value::Float(-3.2)],
        )]);
        let out = normalize_types(input, &SchemaDefinition::coffee_survey());
        let col = &out.table.columns()[0];
        assert_eq!(col.dtype, ColumnType::Int32);
        // median of [25.9, -3.2] is 11.35, floored to 11
        assert_eq!(col.values, vec![Value::Int(25), Value::Int(11), Value::Int(-3)]);
    }

    #[test]
    fn test_out_of_range_column_is_kept_with_warning() {
        let original = Column::new(
            "Heart_Rate",
            ColumnType::Int64,
            vec![Value::Int(70), Value::Int(10_000_000_000)],
        );
        let input = table(vec![
            original.clone(),
            Column::new(
                "Gender",
                ColumnType::Text,
                vec![Value::text("F"), Value::Null],
            ),
        ]);
        let out = normalize_types(input, &SchemaDefinition::coffee_survey());
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].column, "Heart_Rate");
        assert_eq!(out.table.columns()[0], original);
        // the other column is still normalized
        assert_eq!(out.table.columns()[1].dtype, ColumnType::Category);
        assert_eq!(out.table.columns()[1].values[1], Value::text("F"));
    }

    #[test]
    fn test_category_keeps_text_values() {
        let input = table(vec![Column::new(
            "Stress_Level",
            ColumnType::Text,
            vec![Value::text("Low"), Value::text("High"), Value::text("Low")],
        )]);
        let out = normalize_types(input, &SchemaDefinition::coffee_survey());
        let col = &out.table.columns()[0];
        assert_eq!(col.dtype, ColumnType::Category);
        assert_eq!(
            col.values,
            vec![Value::text("Low"), Value::text("High"), Value::text("Low")]
        );
    }

    #[test]
    fn test_category_renders_numbers_as_labels() {
        let input = table(vec![Column::new(
            "Sleep_Quality",
            ColumnType::Int64,
            vec![Value::Int(3), Value::Null],
        )]);
        let out = normalize_types(input, &SchemaDefinition::coffee_survey());
        assert_eq!(
            out.table.columns()[0].values,
            vec![Value::text("3"), Value::text("3")]
        );
    }

    #[test]
    fn test_columns_outside_schema_untouched() {
        let column = Column::new("Notes", ColumnType::Text, vec![Value::Null]);
        let input = table(vec![column.clone()]);
        let out = normalize_types(input, &SchemaDefinition::coffee_survey());
        assert_eq!(out.table.columns()[0], column);
    }

    #[test]
    fn test_all_missing_numeric_uses_zero() {
        let column = Column::new("bmi", ColumnType::Text, vec![Value::Null, Value::Null]);
        let coerced = coerce_column(&column, ColumnType::Float64).unwrap();
        assert_eq!(coerced.values, vec![Value::Float(0.0), Value::Float(0.0)]);
    }

    #[test]
    fn test_integer_fill_from_text_and_all_missing() {
        let column = Column::new(
            "Heart_Rate",
            ColumnType::Text,
            vec![Value::text("71"), Value::text("junk"), Value::text("80.0")],
        );
        let coerced = coerce_column(&column, ColumnType::Int32).unwrap();
        assert_eq!(coerced.values, vec![Value::Int(71), Value::Int(75), Value::Int(80)]);

        let empty = Column::new("Smoking", ColumnType::Text, vec![Value::Null, Value::text("?")]);
        let coerced = coerce_column(&empty, ColumnType::Int32).unwrap();
        assert_eq!(coerced.values, vec![Value::Int(0), Value::Int(0)]);
    }
}
