//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - moved between pipeline stages without conversion
//! - exported to JSON/CSV
//! - built by hand in tests

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::formula::Formula;

/// On-disk format of a tabular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    /// A JSON array of `{column: value}` records.
    Json,
}

/// In-memory representation used for data handling.
///
/// Only the column-oriented `Table` is implemented; the setting exists so a
/// parameter file can name its backend explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBackend {
    Memory,
}

/// Estimator used to fit each model formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// Unpenalised binomial GLM (logit link) fitted by IRLS.
    Glm,
    /// Binomial GLM with an L2 penalty on the non-intercept coefficients.
    Penalized,
}

impl ModelBackend {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelBackend::Glm => "GLM (binomial, logit)",
            ModelBackend::Penalized => "L2-penalized logistic",
        }
    }
}

/// Statistic used to order fitted models in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RankBy {
    /// Descending test-set accuracy.
    #[default]
    Accuracy,
    /// Ascending AIC on the training set.
    Aic,
}

/// Generic column type as declared in a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    String,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::String => "string",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values of one column. `None` is a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Integer(Vec<Option<i64>>),
    Real(Vec<Option<f64>>),
    String(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Integer(v) => v.len(),
            ColumnData::Real(v) => v.len(),
            ColumnData::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> ColumnType {
        match self {
            ColumnData::Integer(_) => ColumnType::Integer,
            ColumnData::Real(_) => ColumnType::Real,
            ColumnData::String(_) => ColumnType::String,
        }
    }

    pub fn num_missing(&self) -> usize {
        match self {
            ColumnData::Integer(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Real(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::String(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnData::Integer(v) => v[row].is_none(),
            ColumnData::Real(v) => v[row].is_none(),
            ColumnData::String(v) => v[row].is_none(),
        }
    }

    /// Numeric value of a cell; `None` for missing cells and string columns.
    pub fn numeric(&self, row: usize) -> Option<f64> {
        match self {
            ColumnData::Integer(v) => v[row].map(|x| x as f64),
            ColumnData::Real(v) => v[row],
            ColumnData::String(_) => None,
        }
    }

    /// Cell rendered as a categorical level.
    pub fn level(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Integer(v) => v[row].map(|x| x.to_string()),
            ColumnData::Real(v) => v[row].map(fmt_real),
            ColumnData::String(v) => v[row].clone(),
        }
    }

    /// Cell rendered for a text file; missing values become an empty string.
    pub fn render(&self, row: usize) -> String {
        self.level(row).unwrap_or_default()
    }

    pub fn select(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Integer(v) => ColumnData::Integer(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Real(v) => ColumnData::Real(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::String(v) => ColumnData::String(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }
}

/// Format a real so it always reads back as a real (`57` -> `57.0`).
pub fn fmt_real(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Column-oriented in-memory table shared by every pipeline stage.
///
/// All columns have the same length and distinct names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, AppError> {
        let mut table = Table::default();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn push_column(&mut self, column: Column) -> Result<(), AppError> {
        if self.has_column(&column.name) {
            return Err(AppError::input(format!("Duplicate column `{}`.", column.name)));
        }
        if let Some(first) = self.columns.first() {
            if first.data.len() != column.data.len() {
                return Err(AppError::input(format!(
                    "Column `{}` has {} rows, expected {}.",
                    column.name,
                    column.data.len(),
                    first.data.len()
                )));
            }
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_cols())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn num_missing(&self) -> usize {
        self.columns.iter().map(|c| c.data.num_missing()).sum()
    }

    pub fn dtypes(&self) -> BTreeMap<String, ColumnType> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.data.dtype()))
            .collect()
    }

    /// New table holding `rows` (in the given order).
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.select(rows)))
                .collect(),
        }
    }

    fn require(&self, name: &str) -> Result<&ColumnData, AppError> {
        self.column(name)
            .map(|c| &c.data)
            .ok_or_else(|| AppError::input(format!("Missing column `{name}`.")))
    }

    pub fn integers(&self, name: &str) -> Result<&[Option<i64>], AppError> {
        match self.require(name)? {
            ColumnData::Integer(v) => Ok(v.as_slice()),
            other => Err(type_error(name, ColumnType::Integer, other.dtype())),
        }
    }

    pub fn reals(&self, name: &str) -> Result<&[Option<f64>], AppError> {
        match self.require(name)? {
            ColumnData::Real(v) => Ok(v.as_slice()),
            other => Err(type_error(name, ColumnType::Real, other.dtype())),
        }
    }

    pub fn strings(&self, name: &str) -> Result<&[Option<String>], AppError> {
        match self.require(name)? {
            ColumnData::String(v) => Ok(v.as_slice()),
            other => Err(type_error(name, ColumnType::String, other.dtype())),
        }
    }
}

fn type_error(name: &str, expected: ColumnType, observed: ColumnType) -> AppError {
    AppError::input(format!("Column `{name}` is {observed}, expected {expected}."))
}

/// One row of the raw student-performance extract.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub mod_result: i64,
    /// Not carried into the clean table, so it may be missing.
    pub exam_score: Option<i64>,
    pub continous_ass_score: i64,
    pub region: String,
    pub gender: String,
    pub imd: String,
    pub qual_link: String,
    pub best_prev_mod_score: f64,
    pub age: i64,
}

/// One row of the cleaned dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    pub did_pass: i64,
    pub cma_score: i64,
    pub region: String,
    pub gender: String,
    pub imd: String,
    pub qual_link: String,
    pub best_prev_mod_score: f64,
    pub estimated_age: i64,
}

/// A declared candidate model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub id: u32,
    pub formula: Formula,
    pub description: Option<String>,
}

/// One fitted coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    /// `None` when the information matrix could not be inverted.
    pub std_error: Option<f64>,
    pub z: Option<f64>,
}

/// In-sample fit statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitQuality {
    pub n_obs: usize,
    pub n_params: usize,
    pub iterations: usize,
    pub log_likelihood: f64,
    pub null_log_likelihood: f64,
    pub deviance: f64,
    pub aic: f64,
    pub bic: f64,
    /// McFadden's pseudo R-squared.
    pub pseudo_r2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfusionMatrix {
    pub true_pos: usize,
    pub false_pos: usize,
    pub true_neg: usize,
    pub false_neg: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.true_pos + self.false_pos + self.true_neg + self.false_neg
    }
}

/// Out-of-sample statistics on the test partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestMetrics {
    pub n_obs: usize,
    pub accuracy: f64,
    /// Accuracy of always predicting the training majority class.
    pub baseline_accuracy: f64,
    pub log_loss: f64,
    /// `None` when the test partition holds a single class.
    pub auc: Option<f64>,
    pub confusion: ConfusionMatrix,
}

/// A successfully fitted and evaluated model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    pub model_id: u32,
    pub description: Option<String>,
    pub formula: String,
    pub coefficients: Vec<Coefficient>,
    pub quality: FitQuality,
    pub test: TestMetrics,
}

/// A model that could not be fitted, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct ModelFailure {
    pub model_id: u32,
    #[serde(serialize_with = "serialize_display")]
    pub error: AppError,
}

fn serialize_display<S: serde::Serializer>(value: &AppError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table::new(vec![
            Column::new("a", ColumnData::Integer(vec![Some(1), None, Some(3)])),
            Column::new("b", ColumnData::String(vec![Some("x".into()), Some("y".into()), None])),
        ])
        .unwrap()
    }

    #[test]
    fn table_reports_shape_and_missing() {
        let t = sample_table();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.num_missing(), 2);
        assert_eq!(t.dtypes().get("b"), Some(&ColumnType::String));
    }

    #[test]
    fn table_rejects_ragged_and_duplicate_columns() {
        let mut t = sample_table();
        let err = t
            .push_column(Column::new("c", ColumnData::Real(vec![Some(1.0)])))
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(t.push_column(Column::new("a", ColumnData::Integer(vec![None; 3]))).is_err());
    }

    #[test]
    fn select_rows_keeps_order() {
        let t = sample_table().select_rows(&[2, 0]);
        assert_eq!(t.integers("a").unwrap(), &[Some(3), Some(1)]);
        assert!(t.strings("a").is_err());
    }

    #[test]
    fn reals_render_with_a_decimal_point() {
        assert_eq!(fmt_real(57.0), "57.0");
        assert_eq!(fmt_real(57.25), "57.25");
    }
}
