//! Schema validation for loaded tables.
//!
//! A schema declares the expected shape, the expected number of missing
//! values, and the generic type of every column. Validation order:
//!
//! 1. shape (rows, columns): a structural mismatch stops validation
//! 2. missing-value count, column names, column types: all mismatches are collected

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{ColumnType, Table};
use crate::error::AppError;

/// Declared expectations for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// `[rows, columns]`.
    pub shape: [usize; 2],
    pub num_missing: usize,
    pub features: BTreeMap<String, ColumnType>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    Shape {
        expected: [usize; 2],
        observed: [usize; 2],
    },
    MissingValues {
        expected: usize,
        observed: usize,
    },
    MissingColumn(String),
    UnexpectedColumn(String),
    DType {
        column: String,
        expected: ColumnType,
        observed: ColumnType,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Shape { expected, observed } => write!(
                f,
                "shape is [{}, {}], expected [{}, {}]",
                observed[0], observed[1], expected[0], expected[1]
            ),
            Mismatch::MissingValues { expected, observed } => {
                write!(f, "{observed} missing values, expected {expected}")
            }
            Mismatch::MissingColumn(name) => write!(f, "missing column `{name}`"),
            Mismatch::UnexpectedColumn(name) => write!(f, "unexpected column `{name}`"),
            Mismatch::DType {
                column,
                expected,
                observed,
            } => write!(f, "column `{column}` is {observed}, expected {expected}"),
        }
    }
}

/// Outcome of validating one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub dataset: String,
    pub shape: [usize; 2],
    pub mismatches: Vec<Mismatch>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(AppError::SchemaMismatch {
                dataset: self.dataset,
                mismatches: self.mismatches,
            })
        }
    }
}

/// Compare `table` with `schema`.
pub fn validate_table(table: &Table, schema: &Schema, dataset: &str) -> ValidationReport {
    let (rows, cols) = table.shape();
    let observed_shape = [rows, cols];
    let mut mismatches = Vec::new();

    if observed_shape != schema.shape {
        mismatches.push(Mismatch::Shape {
            expected: schema.shape,
            observed: observed_shape,
        });
        return ValidationReport {
            dataset: dataset.to_string(),
            shape: observed_shape,
            mismatches,
        };
    }

    let observed_missing = table.num_missing();
    if observed_missing != schema.num_missing {
        mismatches.push(Mismatch::MissingValues {
            expected: schema.num_missing,
            observed: observed_missing,
        });
    }

    let observed = table.dtypes();
    for name in schema.features.keys() {
        if !observed.contains_key(name) {
            mismatches.push(Mismatch::MissingColumn(name.clone()));
        }
    }
    for (name, dtype) in &observed {
        match schema.features.get(name) {
            None => mismatches.push(Mismatch::UnexpectedColumn(name.clone())),
            Some(expected) if expected != dtype => mismatches.push(Mismatch::DType {
                column: name.clone(),
                expected: *expected,
                observed: *dtype,
            }),
            Some(_) => {}
        }
    }

    ValidationReport {
        dataset: dataset.to_string(),
        shape: observed_shape,
        mismatches,
    }
}

/// Validate and turn any mismatch into `AppError::SchemaMismatch`.
pub fn ensure_valid(table: &Table, schema: &Schema, dataset: &str) -> Result<(), AppError> {
    let report = validate_table(table, schema, dataset);
    if report.is_valid() {
        tracing::info!(dataset, rows = report.shape[0], cols = report.shape[1], "schema ok");
    } else {
        for m in &report.mismatches {
            tracing::warn!(dataset, "schema mismatch: {m}");
        }
    }
    report.into_result()
}
