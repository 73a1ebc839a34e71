//! Missing-value statistics and per-column fill.
//!
//! Numeric columns are filled with the median, everything else with the mode.
//! When a column has no usable value the fill falls back to a sentinel:
//! `0` for numbers, `"Unknown"` for labels and text.

use crate::data::schema::ColumnType;
use crate::data::table::{Column, Value};
use std::collections::HashMap;

pub const UNKNOWN_LABEL: &str = "Unknown";

/// Median of the cells that read as finite numbers.
pub fn median(values: &[Value]) -> Option<f64> {
    let mut nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    if nums.is_empty() {
        return None;
    }
    nums.sort_by(f64::total_cmp);
    let mid = nums.len() / 2;
    if nums.len() % 2 == 0 {
        Some((nums[mid - 1] + nums[mid]) / 2.0)
    } else {
        Some(nums[mid])
    }
}

/// Most frequent non-null value. Among equally frequent values the one seen first wins.
pub fn mode(values: &[Value]) -> Option<Value> {
    let mut counts: HashMap<&Value, (usize, usize)> = HashMap::new();
    for (idx, v) in values.iter().enumerate().filter(|(_, v)| !v.is_null()) {
        counts.entry(v).or_insert((0, idx)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(v, _)| v.clone())
}

/// The value used to fill missing cells of a column of the given type.
pub fn fill_value(values: &[Value], dtype: ColumnType) -> Value {
    match dtype {
        // Integer medians are floored: [25, 30] fills with 27.
        ColumnType::Int32 | ColumnType::Int64 => {
            Value::Int(median(values).map_or(0, |m| m.floor() as i64))
        }
        ColumnType::Float64 => Value::Float(median(values).unwrap_or(0.0)),
        ColumnType::Text | ColumnType::Category => {
            mode(values).unwrap_or_else(|| Value::text(UNKNOWN_LABEL))
        }
        ColumnType::Date => mode(values).unwrap_or(Value::Date(chrono::NaiveDate::default())),
    }
}

/// Fill the missing cells of a column. Returns the new column and how many cells were filled.
pub fn impute_column(column: &Column) -> (Column, usize) {
    let missing = column.null_count();
    if missing == 0 {
        return (column.clone(), 0);
    }
    let fill = fill_value(&column.values, column.dtype);
    let values = column
        .values
        .iter()
        .map(|v| if v.is_null() { fill.clone() } else { v.clone() })
        .collect();
    (Column::new(column.name.clone(), column.dtype, values), missing)
}
