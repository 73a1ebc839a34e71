//! In-memory columnar table.

use crate::data::schema::ColumnType;
use crate::error::EtlError;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// A single cell.
#[derive(Debug, Clone)]
pub enum Value {
    /// The missing-value marker.
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric reading of the cell. Text is parsed; non-finite numbers count as missing.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Null | Self::Date(_) => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Text rendering used by the CSV sink and for categorical labels.
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{f:.1}"),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

// Floats compare by bit pattern so that rows can be hashed for deduplication.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
            Self::Date(d) => d.hash(state),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A named, homogeneously typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: ColumnType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }
}

/// An ordered collection of equal-length, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, EtlError> {
        let mut names = HashSet::new();
        for col in &columns {
            if !names.insert(col.name.as_str()) {
                return Err(EtlError::schema(format!(
                    "duplicate column name '{}'",
                    col.name
                )));
            }
        }
        if let Some(first) = columns.first() {
            if let Some(bad) = columns.iter().find(|c| c.len() != first.len()) {
                return Err(EtlError::schema(format!(
                    "column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    first.len()
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count(), self.column_count())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Exact-name lookup.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }

    /// Append a column, rejecting duplicate names and mismatched lengths.
    pub fn with_column(self, column: Column) -> Result<Self, EtlError> {
        let mut columns = self.columns;
        columns.push(column);
        Self::new(columns)
    }

    /// Rebuild every column. `f` must keep each column's name and length.
    pub fn map_columns(self, f: impl FnMut(Column) -> Column) -> Self {
        let rows = self.row_count();
        let columns: Vec<Column> = self.columns.into_iter().map(f).collect();
        debug_assert!(columns.iter().all(|c| c.len() == rows));
        Self { columns }
    }

    /// Keep only the rows whose mask entry is `true`.
    pub fn retain_rows(self, keep: &[bool]) -> Self {
        let columns = self
            .columns
            .into_iter()
            .map(|col| {
                let values = col
                    .values
                    .into_iter()
                    .zip(keep)
                    .filter_map(|(v, k)| k.then_some(v))
                    .collect();
                Column::new(col.name, col.dtype, values)
            })
            .collect();
        Self { columns }
    }

    /// Render the first `n` rows as an aligned text preview.
    pub fn head(&self, n: usize) -> String {
        let rows = n.min(self.row_count());
        let widths: Vec<usize> = self
            .columns
            .iter()
            .map(|c| {
                c.values[..rows]
                    .iter()
                    .map(|v| v.render().len())
                    .chain(std::iter::once(c.name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:>w$}", c.name, w = *w))
            .collect();
        out.push_str(&header.join("  "));
        for i in 0..rows {
            out.push('\n');
            let line: Vec<String> = self
                .columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:>w$}", c.values[i].render(), w = *w))
                .collect();
            out.push_str(&line.join("  "));
        }
        out
    }
}
