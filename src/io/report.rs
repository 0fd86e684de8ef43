//! Read/write the JSON run report.
//!
//! The report is the portable record of a run: dataset shapes, every ranked
//! model with coefficients and metrics, failed models, and the generation
//! timestamp. Its schema is `report::Report`.

use std::fs::File;
use std::path::Path;

use crate::error::AppError;
use crate::io::table::ensure_parent_dir;
use crate::report::Report;

pub fn write_report_json(path: &Path, report: &Report) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create report JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::input(format!("Failed to write report JSON: {e}")))?;

    tracing::info!(path = %path.display(), "wrote report JSON");
    Ok(())
}
