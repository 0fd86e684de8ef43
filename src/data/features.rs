//! Derived model features.
//!
//! The model formulas refer to two indicators that are not part of the clean
//! schema. They are appended here, after the clean table has been validated:
//!
//! - `is_female`: 1 when `gender` is `female` (ASCII case-insensitive)
//! - `is_maths`: 1 when `qual_link` is `maths`
//!
//! The source columns are kept so formulas can still use them directly.

use crate::domain::{Column, ColumnData, Table};
use crate::error::AppError;

pub const IS_FEMALE: &str = "is_female";
pub const IS_MATHS: &str = "is_maths";

pub fn build_features(clean: &Table) -> Result<Table, AppError> {
    let is_female = indicator(clean.strings("gender")?, "female");
    let is_maths = indicator(clean.strings("qual_link")?, "maths");

    let mut out = clean.clone();
    out.push_column(Column::new(IS_FEMALE, ColumnData::Integer(is_female)))?;
    out.push_column(Column::new(IS_MATHS, ColumnData::Integer(is_maths)))?;
    Ok(out)
}

fn indicator(values: &[Option<String>], level: &str) -> Vec<Option<i64>> {
    values
        .iter()
        .map(|v| v.as_deref().map(|s| i64::from(s.trim().eq_ignore_ascii_case(level))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_indicators() {
        let clean = Table::new(vec![
            Column::new(
                "gender",
                ColumnData::String(vec![Some("female".into()), Some("Male".into()), Some("FEMALE".into()), None]),
            ),
            Column::new(
                "qual_link",
                ColumnData::String(vec![Some("maths".into()), Some("arts".into()), Some("maths".into()), Some("arts".into())]),
            ),
        ])
        .unwrap();

        let out = build_features(&clean).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert_eq!(out.integers(IS_FEMALE).unwrap(), &[Some(1), Some(0), Some(1), None]);
        assert_eq!(out.integers(IS_MATHS).unwrap(), &[Some(1), Some(0), Some(1), Some(0)]);
    }
}
