//! Table persistence: CSV for humans, Parquet for typed round trips.

use crate::data::schema::ColumnType;
use crate::data::source::parse_csv;
use crate::data::table::{Column, Table, Value};
use crate::error::EtlError;
use arrow::array::{
    Array, ArrayRef, AsArray, Date32Array, DictionaryArray, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::{DataType, Date32Type, Field, Float64Type, Int32Type, Int64Type, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Pick from the file extension.
    #[default]
    Auto,
    Csv,
    Parquet,
}

impl OutputFormat {
    /// Resolve `Auto` against a destination path.
    pub fn resolve(self, path: &Path) -> Self {
        match self {
            Self::Auto => {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
                if ext.eq_ignore_ascii_case("parquet") || ext.eq_ignore_ascii_case("pq") {
                    Self::Parquet
                } else {
                    Self::Csv
                }
            }
            other => other,
        }
    }
}

/// What was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkReport {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub rows: usize,
    pub columns: usize,
    pub bytes: u64,
    pub sha256: String,
}

/// Write `table` to `path`, creating parent directories.
pub fn write_table(
    table: &Table,
    path: &Path,
    format: OutputFormat,
) -> Result<SinkReport, EtlError> {
    let format = format.resolve(path);
    match format {
        OutputFormat::Parquet => write_parquet(table, path)?,
        _ => write_csv(table, path)?,
    }
    let bytes = std::fs::metadata(path)?.len();
    Ok(SinkReport {
        path: path.to_path_buf(),
        format,
        rows: table.row_count(),
        columns: table.column_count(),
        bytes,
        sha256: hash_file(path)?,
    })
}

fn create_parent(path: &Path) -> Result<(), EtlError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Header line plus one rendered row per record. Types are not preserved.
pub fn write_csv(table: &Table, path: &Path) -> Result<(), EtlError> {
    create_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(table.column_names())?;
    for i in 0..table.row_count() {
        wtr.write_record(table.row(i).iter().map(|v| v.render()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Reload a CSV file, re-inferring column types.
pub fn read_csv(path: &Path, null_tokens: &[String]) -> Result<Table, EtlError> {
    let file = std::fs::File::open(path)?;
    parse_csv(file, null_tokens)
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Write a ZSTD-compressed Parquet file that keeps every column type.
pub fn write_parquet(table: &Table, path: &Path) -> Result<(), EtlError> {
    let batch = to_record_batch(table)?;
    create_parent(path)?;
    let file = std::fs::File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn arrow_type(dtype: ColumnType) -> DataType {
    match dtype {
        ColumnType::Int32 => DataType::Int32,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Text => DataType::Utf8,
        ColumnType::Category => {
            DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
        }
        ColumnType::Date => DataType::Date32,
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn mismatch(column: &Column, value: &Value) -> EtlError {
    EtlError::schema(format!(
        "column '{}' of type {} holds {value:?}",
        column.name, column.dtype
    ))
}

fn to_array(column: &Column) -> Result<ArrayRef, EtlError> {
    let array: ArrayRef = match column.dtype {
        ColumnType::Int32 => {
            let values = column
                .values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Int(i) => i32::try_from(*i).map(Some).map_err(|_| mismatch(column, v)),
                    other => Err(mismatch(column, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(Int32Array::from(values))
        }
        ColumnType::Int64 => {
            let values = column
                .values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Int(i) => Ok(Some(*i)),
                    other => Err(mismatch(column, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(Int64Array::from(values))
        }
        ColumnType::Float64 => {
            let values = column
                .values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Float(f) => Ok(Some(*f)),
                    Value::Int(i) => Ok(Some(*i as f64)),
                    other => Err(mismatch(column, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(Float64Array::from(values))
        }
        ColumnType::Text => {
            let values: Vec<Option<String>> = column
                .values
                .iter()
                .map(|v| (!v.is_null()).then(|| v.render()))
                .collect();
            Arc::new(StringArray::from(values))
        }
        ColumnType::Category => {
            let labels: Vec<Option<String>> = column
                .values
                .iter()
                .map(|v| (!v.is_null()).then(|| v.render()))
                .collect();
            let dict: DictionaryArray<Int32Type> = labels.iter().map(|l| l.as_deref()).collect();
            Arc::new(dict)
        }
        ColumnType::Date => {
            let values = column
                .values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Date(d) => Ok(Some((*d - epoch()).num_days() as i32)),
                    other => Err(mismatch(column, other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(Date32Array::from(values))
        }
    };
    Ok(array)
}

fn to_record_batch(table: &Table) -> Result<RecordBatch, EtlError> {
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(c.dtype), true))
        .collect();
    let arrays = table
        .columns()
        .iter()
        .map(to_array)
        .collect::<Result<Vec<_>, _>>()?;
    let options = RecordBatchOptions::new().with_row_count(Some(table.row_count()));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        arrays,
        &options,
    )?)
}

fn column_type(data_type: &DataType) -> Result<ColumnType, EtlError> {
    match data_type {
        DataType::Int32 => Ok(ColumnType::Int32),
        DataType::Int64 => Ok(ColumnType::Int64),
        DataType::Float64 => Ok(ColumnType::Float64),
        DataType::Utf8 => Ok(ColumnType::Text),
        DataType::Dictionary(key, value)
            if **key == DataType::Int32 && **value == DataType::Utf8 =>
        {
            Ok(ColumnType::Category)
        }
        DataType::Date32 => Ok(ColumnType::Date),
        other => Err(EtlError::format(format!("unsupported Parquet column type {other}"))),
    }
}

fn append_values(
    dtype: ColumnType,
    array: &dyn Array,
    out: &mut Vec<Value>,
) -> Result<(), EtlError> {
    match dtype {
        ColumnType::Int32 => out.extend(
            array
                .as_primitive::<Int32Type>()
                .iter()
                .map(|v| v.map_or(Value::Null, |i| Value::Int(i as i64))),
        ),
        ColumnType::Int64 => out.extend(
            array
                .as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map_or(Value::Null, Value::Int)),
        ),
        ColumnType::Float64 => out.extend(
            array
                .as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.map_or(Value::Null, Value::Float)),
        ),
        ColumnType::Text => out.extend(
            array
                .as_string::<i32>()
                .iter()
                .map(|v| v.map_or(Value::Null, Value::text)),
        ),
        ColumnType::Category => {
            let dict = array.as_dictionary::<Int32Type>();
            let labels = dict.values().as_string::<i32>();
            for key in dict.keys().iter() {
                let Some(key) = key else {
                    out.push(Value::Null);
                    continue;
                };
                let idx = usize::try_from(key)
                    .ok()
                    .filter(|&i| i < labels.len())
                    .ok_or_else(|| {
                        EtlError::format(format!("dictionary key {key} is out of range"))
                    })?;
                out.push(Value::text(labels.value(idx)));
            }
        }
        ColumnType::Date => {
            for days in array.as_primitive::<Date32Type>().iter() {
                let Some(days) = days else {
                    out.push(Value::Null);
                    continue;
                };
                let date = epoch()
                    .checked_add_signed(chrono::Duration::days(days as i64))
                    .ok_or_else(|| {
                        EtlError::format(format!("date offset {days} is out of range"))
                    })?;
                out.push(Value::Date(date));
            }
        }
    }
    Ok(())
}

/// Read a Parquet file back into a table with its stored column types.
pub fn read_parquet(path: &Path) -> Result<Table, EtlError> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let dtypes = schema
        .fields()
        .iter()
        .map(|f| column_type(f.data_type()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut values: Vec<Vec<Value>> = vec![Vec::new(); dtypes.len()];
    for batch in builder.build()? {
        let batch = batch?;
        for (i, dtype) in dtypes.iter().enumerate() {
            append_values(*dtype, batch.column(i).as_ref(), &mut values[i])?;
        }
    }

    let columns = schema
        .fields()
        .iter()
        .zip(dtypes)
        .zip(values)
        .map(|((field, dtype), values)| Column::new(field.name().clone(), dtype, values))
        .collect();
    Table::new(columns).map_err(|e| EtlError::format(e.to_string()))
}

/// Compute SHA-256 hash of file contents.
pub fn hash_file(path: &Path) -> Result<String, EtlError> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_null_tokens;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn typed_table() -> Table {
        let date = |m, d| Value::Date(NaiveDate::from_ymd_opt(2024, m, d).unwrap());
        Table::new(vec![
            Column::new("ID", ColumnType::Int64, vec![Value::Int(1), Value::Int(2)]),
            Column::new("Age", ColumnType::Int32, vec![Value::Int(25), Value::Int(27)]),
            Column::new(
                "Sleep_Hours",
                ColumnType::Float64,
                vec![Value::Float(6.5), Value::Float(8.0)],
            ),
            Column::new(
                "Gender",
                ColumnType::Category,
                vec![Value::text("M"), Value::text("F")],
            ),
            Column::new(
                "Notes",
                ColumnType::Text,
                vec![Value::text("decaf, mostly"), Value::Null],
            ),
            Column::new("Survey_Date", ColumnType::Date, vec![date(1, 1), Value::Null]),
            Column::new(
                "Survey_Date_year",
                ColumnType::Int32,
                vec![Value::Int(2024), Value::Null],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_format_resolution() {
        let auto = OutputFormat::Auto;
        assert_eq!(auto.resolve(Path::new("out/x.parquet")), OutputFormat::Parquet);
        assert_eq!(auto.resolve(Path::new("out/x.PQ")), OutputFormat::Parquet);
        assert_eq!(auto.resolve(Path::new("out/x.csv")), OutputFormat::Csv);
        assert_eq!(auto.resolve(Path::new("out/x")), OutputFormat::Csv);
        assert_eq!(
            OutputFormat::Parquet.resolve(Path::new("x.csv")),
            OutputFormat::Parquet
        );
    }

    #[test]
    fn test_parquet_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("clean.parquet");
        let table = typed_table();

        let report = write_table(&table, &path, OutputFormat::Auto).unwrap();
        assert_eq!(report.format, OutputFormat::Parquet);
        assert_eq!((report.rows, report.columns), (2, 7));
        assert!(report.bytes > 0);
        assert_eq!(report.sha256.len(), 64);

        let back = read_parquet(&path).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_csv_round_trip_as_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("clean.csv");
        let table = typed_table();

        let report = write_table(&table, &path, OutputFormat::Csv).unwrap();
        assert_eq!(report.format, OutputFormat::Csv);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("ID,Age,Sleep_Hours,Gender,Notes,Survey_Date,Survey_Date_year")
        );
        assert_eq!(lines.next(), Some("1,25,6.5,M,\"decaf, mostly\",2024-01-01,2024"));
        assert_eq!(lines.next(), Some("2,27,8.0,F,,,"));

        let back = read_csv(&path, &default_null_tokens()).unwrap();
        assert_eq!(back.column_names(), table.column_names());
        for (orig, read) in table.columns().iter().zip(back.columns()) {
            let a: Vec<String> = orig.values.iter().map(Value::render).collect();
            let b: Vec<String> = read.values.iter().map(Value::render).collect();
            assert_eq!(a, b, "column {}", orig.name);
        }
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let table = Table::new(vec![Column::new(
            "Age",
            ColumnType::Int32,
            vec![Value::text("twenty")],
        )])
        .unwrap();
        let dir = TempDir::new().unwrap();
        let result = write_parquet(&table, &dir.path().join("x.parquet"));
        assert!(matches!(result, Err(EtlError::Schema(_))));
    }

    #[test]
    fn test_out_of_range_date_is_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dates.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new(
            "Survey_Date",
            DataType::Date32,
            true,
        )]));
        let array: ArrayRef = Arc::new(Date32Array::from(vec![Some(0), Some(i32::MAX)]));
        let batch = RecordBatch::try_new(schema.clone(), vec![array]).unwrap();
        let mut writer =
            ArrowWriter::try_new(std::fs::File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        assert!(matches!(read_parquet(&path), Err(EtlError::Format(_))));
    }

    #[test]
    fn test_unwritable_destination_is_io_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let result = write_table(&typed_table(), &blocker.join("out.csv"), OutputFormat::Csv);
        assert!(matches!(result, Err(EtlError::Io(_))));
    }
}
