//! Table readers and writers.
//!
//! The pipeline never touches a file format directly: it asks
//! `create_table_handler` for a handler matching `pipeline.*_format` and
//! `pipeline.data_backend` and calls `load`/`save` on it.
//!
//! Column types are inferred on load:
//!
//! - `integer` when every present value parses as `i64`
//! - `real` when every present value parses as `f64` (an all-missing column is real)
//! - `string` otherwise
//!
//! Empty cells and the usual missing-value tokens (`NA`, `NaN`, `null`, ...)
//! are missing values.

use std::fs::{self, File};
use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::domain::{Column, ColumnData, DataBackend, DataFormat, Table};
use crate::error::AppError;

const MISSING_TOKENS: [&str; 7] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL"];

/// Reads and writes whole tables in one storage format.
pub trait TableHandler: Send + Sync {
    fn format(&self) -> DataFormat;
    fn load(&self, path: &Path) -> Result<Table, AppError>;
    fn save(&self, table: &Table, path: &Path) -> Result<(), AppError>;
}

pub fn create_table_handler(format: DataFormat, backend: DataBackend) -> Box<dyn TableHandler> {
    match (backend, format) {
        (DataBackend::Memory, DataFormat::Csv) => Box::new(CsvHandler),
        (DataBackend::Memory, DataFormat::Json) => Box::new(JsonHandler),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvHandler;

impl TableHandler for CsvHandler {
    fn format(&self) -> DataFormat {
        DataFormat::Csv
    }

    fn load(&self, path: &Path) -> Result<Table, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AppError::input(format!("Failed to read CSV headers in '{}': {e}", path.display())))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for (idx, result) in reader.records().enumerate() {
            // +2: header line, 1-based lines
            let line = idx + 2;
            let record = result
                .map_err(|e| AppError::input(format!("CSV parse error in '{}' at line {line}: {e}", path.display())))?;
            for (col, value) in cells.iter_mut().zip(record.iter()) {
                col.push(if is_missing_token(value) { None } else { Some(value.to_string()) });
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, values)| Column::new(name, infer_column(values)))
            .collect();
        let table = Table::new(columns)?;
        tracing::debug!(path = %path.display(), rows = table.n_rows(), cols = table.n_cols(), "loaded CSV");
        Ok(table)
    }

    fn save(&self, table: &Table, path: &Path) -> Result<(), AppError> {
        ensure_parent_dir(path)?;
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| AppError::input(format!("Failed to create CSV '{}': {e}", path.display())))?;

        writer
            .write_record(table.column_names())
            .map_err(|e| AppError::input(format!("Failed to write CSV header: {e}")))?;
        for row in 0..table.n_rows() {
            let record: Vec<String> = table.columns().iter().map(|c| c.data.render(row)).collect();
            writer
                .write_record(&record)
                .map_err(|e| AppError::input(format!("Failed to write CSV row: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| AppError::input(format!("Failed to flush CSV '{}': {e}", path.display())))?;
        Ok(())
    }
}

/// JSON tables are an array of row objects (`[{"col": value, ...}, ...]`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHandler;

impl TableHandler for JsonHandler {
    fn format(&self) -> DataFormat {
        DataFormat::Json
    }

    fn load(&self, path: &Path) -> Result<Table, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::input(format!("Failed to open JSON '{}': {e}", path.display())))?;
        let rows: Vec<Map<String, Value>> = serde_json::from_reader(file)
            .map_err(|e| AppError::input(format!("Invalid JSON table '{}': {e}", path.display())))?;

        let mut names: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let values: Vec<Option<&Value>> = rows.iter().map(|r| r.get(&name).filter(|v| !v.is_null())).collect();
            columns.push(Column::new(name, json_column(&values)));
        }

        let table = Table::new(columns)?;
        tracing::debug!(path = %path.display(), rows = table.n_rows(), cols = table.n_cols(), "loaded JSON");
        Ok(table)
    }

    fn save(&self, table: &Table, path: &Path) -> Result<(), AppError> {
        ensure_parent_dir(path)?;
        let rows: Vec<Map<String, Value>> = (0..table.n_rows())
            .map(|row| {
                table
                    .columns()
                    .iter()
                    .map(|c| (c.name.clone(), json_cell(&c.data, row)))
                    .collect()
            })
            .collect();

        let file = File::create(path)
            .map_err(|e| AppError::input(format!("Failed to create JSON '{}': {e}", path.display())))?;
        serde_json::to_writer_pretty(file, &rows)
            .map_err(|e| AppError::input(format!("Failed to write JSON '{}': {e}", path.display())))?;
        Ok(())
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::input(format!("Failed to create directory '{}': {e}", parent.display())))?;
    }
    Ok(())
}

fn is_missing_token(value: &str) -> bool {
    MISSING_TOKENS.contains(&value.trim())
}

fn infer_column(values: Vec<Option<String>>) -> ColumnData {
    let present = || values.iter().flatten();

    if present().all(|v| v.parse::<i64>().is_ok()) && present().next().is_some() {
        return ColumnData::Integer(values.iter().map(|v| v.as_ref().and_then(|s| s.parse().ok())).collect());
    }
    if present().all(|v| v.parse::<f64>().is_ok()) {
        return ColumnData::Real(values.iter().map(|v| v.as_ref().and_then(|s| s.parse().ok())).collect());
    }
    ColumnData::String(values)
}

fn json_column(values: &[Option<&Value>]) -> ColumnData {
    let present = || values.iter().flatten();

    if present().next().is_some() && present().all(|v| v.as_i64().is_some()) {
        return ColumnData::Integer(values.iter().map(|v| v.and_then(Value::as_i64)).collect());
    }
    if present().all(|v| v.is_number()) {
        return ColumnData::Real(values.iter().map(|v| v.and_then(Value::as_f64)).collect());
    }
    ColumnData::String(
        values
            .iter()
            .map(|v| {
                v.map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            })
            .collect(),
    )
}

fn json_cell(data: &ColumnData, row: usize) -> Value {
    match data {
        ColumnData::Integer(v) => v[row].map(Value::from).unwrap_or(Value::Null),
        ColumnData::Real(v) => v[row].and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null),
        ColumnData::String(v) => v[row].clone().map(Value::String).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ColumnType;

    fn sample_table() -> Table {
        Table::new(vec![
            Column::new("did_pass", ColumnData::Integer(vec![Some(1), Some(0), Some(1)])),
            Column::new("score", ColumnData::Real(vec![Some(57.0), Some(61.5), None])),
            Column::new("region", ColumnData::String(vec![Some("Wales".into()), Some("London Region".into()), Some("Scotland".into())])),
        ])
        .unwrap()
    }

    #[test]
    fn csv_preserves_types_and_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("t.csv");
        let handler = create_table_handler(DataFormat::Csv, DataBackend::Memory);

        handler.save(&sample_table(), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("did_pass,score,region\n1,57.0,Wales\n"));

        let loaded = handler.load(&path).unwrap();
        assert_eq!(loaded, sample_table());
    }

    #[test]
    fn json_preserves_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        let handler = create_table_handler(DataFormat::Json, DataBackend::Memory);
        assert_eq!(handler.format(), DataFormat::Json);

        handler.save(&sample_table(), &path).unwrap();
        let loaded = handler.load(&path).unwrap();
        assert_eq!(loaded.column_names(), vec!["did_pass", "score", "region"]);
        assert_eq!(loaded, sample_table());
    }

    #[test]
    fn csv_inference_handles_tokens_and_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        fs::write(&path, "\u{feff}a, b ,c,d\n1,2.5,x,\nNA,3,y,\n").unwrap();

        let t = CsvHandler.load(&path).unwrap();
        assert_eq!(t.column_names(), vec!["a", "b", "c", "d"]);
        let dtypes = t.dtypes();
        assert_eq!(dtypes["a"], ColumnType::Integer);
        assert_eq!(dtypes["b"], ColumnType::Real);
        assert_eq!(dtypes["c"], ColumnType::String);
        assert_eq!(dtypes["d"], ColumnType::Real);
        assert_eq!(t.num_missing(), 3);
    }

    #[test]
    fn ragged_csv_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "a,b\n1,2\n3\n").unwrap();
        let err = CsvHandler.load(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = JsonHandler.load(Path::new("/nonexistent/raw.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
