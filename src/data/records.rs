//! Conversions between typed records and the generic `Table`.

use crate::domain::{CleanRecord, Column, ColumnData, RawRecord, Table};
use crate::error::AppError;

/// Typed rows read from a table, plus how many rows were skipped.
#[derive(Debug, Clone)]
pub struct RecordsRead<T> {
    pub records: Vec<T>,
    /// Rows with a missing value in a field the record keeps.
    pub dropped: usize,
}

pub fn raw_records_from_table(table: &Table) -> Result<RecordsRead<RawRecord>, AppError> {
    let mod_result = table.integers("mod_result")?;
    let exam_score = table.integers("exam_score")?;
    let cma = table.integers("continous_ass_score")?;
    let region = table.strings("region")?;
    let gender = table.strings("gender")?;
    let imd = table.strings("imd")?;
    let qual_link = table.strings("qual_link")?;
    let best_prev = table.reals("best_prev_mod_score")?;
    let age = table.integers("age")?;

    let mut records = Vec::with_capacity(table.n_rows());
    let mut dropped = 0usize;

    for i in 0..table.n_rows() {
        let row = (|| {
            Some(RawRecord {
                mod_result: mod_result[i]?,
                exam_score: exam_score[i],
                continous_ass_score: cma[i]?,
                region: region[i].clone()?,
                gender: gender[i].clone()?,
                imd: imd[i].clone()?,
                qual_link: qual_link[i].clone()?,
                best_prev_mod_score: best_prev[i]?,
                age: age[i]?,
            })
        })();
        match row {
            Some(r) => records.push(r),
            None => dropped += 1,
        }
    }

    Ok(RecordsRead { records, dropped })
}

pub fn raw_records_to_table(records: &[RawRecord]) -> Result<Table, AppError> {
    Table::new(vec![
        Column::new("mod_result", ColumnData::Integer(records.iter().map(|r| Some(r.mod_result)).collect())),
        Column::new("exam_score", ColumnData::Integer(records.iter().map(|r| r.exam_score).collect())),
        Column::new(
            "continous_ass_score",
            ColumnData::Integer(records.iter().map(|r| Some(r.continous_ass_score)).collect()),
        ),
        Column::new("region", ColumnData::String(records.iter().map(|r| Some(r.region.clone())).collect())),
        Column::new("gender", ColumnData::String(records.iter().map(|r| Some(r.gender.clone())).collect())),
        Column::new("imd", ColumnData::String(records.iter().map(|r| Some(r.imd.clone())).collect())),
        Column::new("qual_link", ColumnData::String(records.iter().map(|r| Some(r.qual_link.clone())).collect())),
        Column::new(
            "best_prev_mod_score",
            ColumnData::Real(records.iter().map(|r| Some(r.best_prev_mod_score)).collect()),
        ),
        Column::new("age", ColumnData::Integer(records.iter().map(|r| Some(r.age)).collect())),
    ])
}

pub fn clean_records_to_table(records: &[CleanRecord]) -> Result<Table, AppError> {
    Table::new(vec![
        Column::new("did_pass", ColumnData::Integer(records.iter().map(|r| Some(r.did_pass)).collect())),
        Column::new("cma_score", ColumnData::Integer(records.iter().map(|r| Some(r.cma_score)).collect())),
        Column::new("region", ColumnData::String(records.iter().map(|r| Some(r.region.clone())).collect())),
        Column::new("gender", ColumnData::String(records.iter().map(|r| Some(r.gender.clone())).collect())),
        Column::new("imd", ColumnData::String(records.iter().map(|r| Some(r.imd.clone())).collect())),
        Column::new("qual_link", ColumnData::String(records.iter().map(|r| Some(r.qual_link.clone())).collect())),
        Column::new(
            "best_prev_mod_score",
            ColumnData::Real(records.iter().map(|r| Some(r.best_prev_mod_score)).collect()),
        ),
        Column::new(
            "estimated_age",
            ColumnData::Integer(records.iter().map(|r| Some(r.estimated_age)).collect()),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(mod_result: i64) -> RawRecord {
        RawRecord {
            mod_result,
            exam_score: Some(55),
            continous_ass_score: 70,
            region: "Scotland".into(),
            gender: "female".into(),
            imd: "20-30%".into(),
            qual_link: "maths".into(),
            best_prev_mod_score: 61.5,
            age: 29,
        }
    }

    #[test]
    fn raw_records_survive_a_table() {
        let records = vec![raw(1), raw(0)];
        let table = raw_records_to_table(&records).unwrap();
        assert_eq!(table.shape(), (2, 9));
        let read = raw_records_from_table(&table).unwrap();
        assert_eq!(read.records, records);
        assert_eq!(read.dropped, 0);
    }

    #[test]
    fn rows_with_missing_values_are_dropped() {
        let table = raw_records_to_table(&[raw(1), raw(0), raw(1)]).unwrap();
        let mut columns: Vec<Column> = table.columns().to_vec();
        for c in columns.iter_mut() {
            if let ColumnData::String(v) = &mut c.data {
                if c.name == "imd" {
                    v[1] = None;
                }
            }
        }
        let read = raw_records_from_table(&Table::new(columns).unwrap()).unwrap();
        assert_eq!(read.records.len(), 2);
        assert_eq!(read.dropped, 1);
    }
}
