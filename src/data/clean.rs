//! Raw -> clean transformation.
//!
//! | raw | clean |
//! | - | - |
//! | `mod_result` | `did_pass` (1 when `mod_result > 0`) |
//! | `exam_score` | dropped |
//! | `continous_ass_score` | `cma_score` |
//! | `age` | `estimated_age` |
//! | everything else | unchanged |

use crate::data::records::{clean_records_to_table, raw_records_from_table};
use crate::domain::{CleanRecord, RawRecord, Table};
use crate::error::AppError;

pub fn clean_record(raw: &RawRecord) -> CleanRecord {
    CleanRecord {
        did_pass: i64::from(raw.mod_result > 0),
        cma_score: raw.continous_ass_score,
        region: raw.region.clone(),
        gender: raw.gender.clone(),
        imd: raw.imd.clone(),
        qual_link: raw.qual_link.clone(),
        best_prev_mod_score: raw.best_prev_mod_score,
        estimated_age: raw.age,
    }
}

/// Clean a validated raw table. Rows missing a kept value are dropped;
/// `exam_score` is not kept, so a gap there is ignored.
pub fn clean_table(raw: &Table) -> Result<Table, AppError> {
    let read = raw_records_from_table(raw)?;
    if read.dropped > 0 {
        tracing::warn!(dropped = read.dropped, "dropped raw rows with missing values");
    }

    let clean: Vec<CleanRecord> = read.records.iter().map(clean_record).collect();
    tracing::info!(rows = clean.len(), "cleaned raw data");
    clean_records_to_table(&clean)
}
