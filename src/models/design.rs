//! Design matrices for binomial models.
//!
//! A `DesignEncoder` is learned from the training partition and then applied
//! unchanged to any other partition, so train and test share one column
//! layout:
//!
//! - `Intercept` (unless the formula removes it with `0`)
//! - numeric columns as-is
//! - `C(x)` terms and string columns treatment-coded: one 0/1 column per
//!   non-reference level, levels sorted, the first level is the reference
//!
//! A level that only appears outside the training partition encodes as the
//! reference level. Rows with a missing value in any used column are skipped.

use nalgebra::{DMatrix, DVector};

use crate::domain::{Column, ColumnData, ColumnType, Table, fmt_real};
use crate::error::AppError;
use crate::formula::{Formula, Term};
use crate::math::sigmoid;

pub const INTERCEPT: &str = "Intercept";

#[derive(Debug, Clone, PartialEq)]
enum Encoded {
    Intercept,
    Numeric { field: String },
    Categorical { field: String, levels: Vec<String> },
}

impl Encoded {
    fn width(&self) -> usize {
        match self {
            Encoded::Intercept | Encoded::Numeric { .. } => 1,
            Encoded::Categorical { levels, .. } => levels.len().saturating_sub(1),
        }
    }
}

/// Encoded rows of one partition.
#[derive(Debug, Clone)]
pub struct Design {
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
    pub skipped: usize,
}

impl Design {
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignEncoder {
    response: String,
    parts: Vec<Encoded>,
    names: Vec<String>,
}

impl DesignEncoder {
    /// Learn column layout and categorical levels from `train`.
    pub fn learn(formula: &Formula, train: &Table) -> Result<Self, AppError> {
        require_response(train, &formula.response)?;
        let used = used_fields(formula);
        let rows = complete_rows(train, &used)?;

        let mut parts = Vec::new();
        let mut names = Vec::new();
        if formula.intercept {
            parts.push(Encoded::Intercept);
            names.push(INTERCEPT.to_string());
        }
        for term in &formula.terms {
            let field = term.field().to_string();
            let column = column_data(train, &field)?;
            let categorical = matches!(term, Term::Categorical(_)) || column.dtype() == ColumnType::String;
            if categorical {
                // `C(imd)[T.10-20%]`, or `region[T.Wales]` for a bare string column
                let label = term.to_string();
                let levels = sorted_levels(column, &rows);
                names.extend(levels.iter().skip(1).map(|l| format!("{label}[T.{l}]")));
                parts.push(Encoded::Categorical { field, levels });
            } else {
                names.push(field.clone());
                parts.push(Encoded::Numeric { field });
            }
        }

        Ok(Self {
            response: formula.response.clone(),
            parts,
            names,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_params(&self) -> usize {
        self.parts.iter().map(Encoded::width).sum()
    }

    /// Column indices that are not the intercept.
    pub fn non_intercept(&self) -> Vec<usize> {
        self.names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.as_str() != INTERCEPT)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn encode(&self, table: &Table) -> Result<Design, AppError> {
        require_response(table, &self.response)?;
        let mut used = vec![self.response.clone()];
        for part in &self.parts {
            match part {
                Encoded::Intercept => {}
                Encoded::Numeric { field } | Encoded::Categorical { field, .. } => used.push(field.clone()),
            }
        }
        let rows = complete_rows(table, &used)?;
        let response = response_values(table, &self.response, &rows)?;

        let p = self.n_params();
        let mut x = DMatrix::<f64>::zeros(rows.len(), p);
        for (i, &row) in rows.iter().enumerate() {
            let mut j = 0;
            for part in &self.parts {
                match part {
                    Encoded::Intercept => {
                        x[(i, j)] = 1.0;
                        j += 1;
                    }
                    Encoded::Numeric { field } => {
                        x[(i, j)] = column_data(table, field)?.numeric(row).unwrap_or(0.0);
                        j += 1;
                    }
                    Encoded::Categorical { field, levels } => {
                        let level = column_data(table, field)?.level(row);
                        if let Some(pos) = level.and_then(|l| levels.iter().position(|v| *v == l)) {
                            if pos > 0 {
                                x[(i, j + pos - 1)] = 1.0;
                            }
                        }
                        j += levels.len().saturating_sub(1);
                    }
                }
            }
        }

        Ok(Design {
            x,
            y: DVector::from_vec(response),
            skipped: table.n_rows() - rows.len(),
        })
    }
}

fn require_response<'a>(table: &'a Table, response: &str) -> Result<&'a Column, AppError> {
    table.column(response).ok_or_else(|| AppError::InvalidResponse {
        field: response.to_string(),
        reason: "column not found".to_string(),
    })
}

fn used_fields(formula: &Formula) -> Vec<String> {
    std::iter::once(formula.response.clone())
        .chain(formula.covariates().map(str::to_string))
        .collect()
}

fn column_data<'a>(table: &'a Table, field: &str) -> Result<&'a ColumnData, AppError> {
    table
        .column(field)
        .map(|c| &c.data)
        .ok_or_else(|| AppError::input(format!("Column `{field}` not found.")))
}

fn complete_rows(table: &Table, fields: &[String]) -> Result<Vec<usize>, AppError> {
    let columns = fields
        .iter()
        .map(|f| column_data(table, f))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((0..table.n_rows())
        .filter(|&row| columns.iter().all(|c| !c.is_missing(row)))
        .collect())
}

fn sorted_levels(column: &ColumnData, rows: &[usize]) -> Vec<String> {
    match column {
        ColumnData::Integer(_) | ColumnData::Real(_) => {
            let mut values: Vec<f64> = rows.iter().filter_map(|&r| column.numeric(r)).collect();
            values.sort_by(f64::total_cmp);
            values.dedup();
            values
                .into_iter()
                .map(|v| match column {
                    ColumnData::Integer(_) => (v as i64).to_string(),
                    _ => fmt_real(v),
                })
                .collect()
        }
        ColumnData::String(_) => {
            let mut levels: Vec<String> = rows.iter().filter_map(|&r| column.level(r)).collect();
            levels.sort();
            levels.dedup();
            levels
        }
    }
}

/// Fitted probabilities `sigmoid(x β)` for every row of `x`.
pub fn predict_proba(x: &DMatrix<f64>, beta: &DVector<f64>) -> Vec<f64> {
    (x * beta).iter().map(|&eta| sigmoid(eta)).collect()
}

/// The response must be numeric and strictly 0/1.
pub fn response_values(table: &Table, response: &str, rows: &[usize]) -> Result<Vec<f64>, AppError> {
    let column = require_response(table, response)?;
    let mut out = Vec::with_capacity(rows.len());
    for &row in rows {
        match column.data.numeric(row) {
            Some(v) if v == 0.0 || v == 1.0 => out.push(v),
            Some(v) => {
                return Err(AppError::InvalidResponse {
                    field: response.to_string(),
                    reason: format!("value {v} at row {row} is not 0 or 1"),
                });
            }
            None => {
                return Err(AppError::InvalidResponse {
                    field: response.to_string(),
                    reason: format!("non-numeric value at row {row}"),
                });
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(vec![
            Column::new("did_pass", ColumnData::Integer(vec![Some(1), Some(0), Some(1), Some(0)])),
            Column::new("cma_score", ColumnData::Integer(vec![Some(80), Some(30), None, Some(55)])),
            Column::new(
                "imd",
                ColumnData::String(vec![
                    Some("10-20%".into()),
                    Some("0-10%".into()),
                    Some("20-30%".into()),
                    Some("20-30%".into()),
                ]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn treatment_coding_uses_first_sorted_level_as_reference() {
        let f = Formula::parse("did_pass ~ cma_score + C(imd)").unwrap();
        let enc = DesignEncoder::learn(&f, &table()).unwrap();
        assert_eq!(
            enc.names(),
            &["Intercept", "cma_score", "C(imd)[T.10-20%]", "C(imd)[T.20-30%]"]
        );
        assert_eq!(enc.non_intercept(), vec![1, 2, 3]);

        let d = enc.encode(&table()).unwrap();
        // row 2 has a missing cma_score
        assert_eq!(d.n_rows(), 3);
        assert_eq!(d.skipped, 1);
        assert_eq!(d.x.row(0).iter().copied().collect::<Vec<_>>(), vec![1.0, 80.0, 1.0, 0.0]);
        assert_eq!(d.x.row(1).iter().copied().collect::<Vec<_>>(), vec![1.0, 30.0, 0.0, 0.0]);
        assert_eq!(d.x.row(2).iter().copied().collect::<Vec<_>>(), vec![1.0, 55.0, 0.0, 1.0]);
        assert_eq!(d.y.as_slice(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn unseen_level_encodes_as_reference() {
        let f = Formula::parse("did_pass ~ 0 + imd").unwrap();
        let enc = DesignEncoder::learn(&f, &table()).unwrap();
        assert_eq!(enc.names(), &["imd[T.10-20%]", "imd[T.20-30%]"]);

        let test = Table::new(vec![
            Column::new("did_pass", ColumnData::Integer(vec![Some(1)])),
            Column::new("imd", ColumnData::String(vec![Some("90-100%".into())])),
        ])
        .unwrap();
        let d = enc.encode(&test).unwrap();
        assert_eq!(d.x.row(0).iter().copied().collect::<Vec<_>>(), vec![0.0, 0.0]);
    }

    #[test]
    fn integer_levels_sort_numerically() {
        let t = Table::new(vec![
            Column::new("did_pass", ColumnData::Integer(vec![Some(1), Some(0), Some(1)])),
            Column::new("band", ColumnData::Integer(vec![Some(10), Some(2), Some(1)])),
        ])
        .unwrap();
        let f = Formula::parse("did_pass ~ C(band)").unwrap();
        let enc = DesignEncoder::learn(&f, &t).unwrap();
        assert_eq!(enc.names(), &["Intercept", "C(band)[T.2]", "C(band)[T.10]"]);
    }

    #[test]
    fn non_binary_response_is_rejected() {
        let t = Table::new(vec![
            Column::new("did_pass", ColumnData::Integer(vec![Some(1), Some(2)])),
            Column::new("x", ColumnData::Real(vec![Some(0.1), Some(0.2)])),
        ])
        .unwrap();
        let f = Formula::parse("did_pass ~ x").unwrap();
        let enc = DesignEncoder::learn(&f, &t).unwrap();
        let err = enc.encode(&t).unwrap_err();
        assert!(matches!(err, AppError::InvalidResponse { .. }));
        assert_eq!(err.exit_code(), 3);
    }
}
