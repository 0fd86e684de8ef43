//! Export the model ranking to CSV.
//!
//! One row per fitted model, in report order, easy to open in a spreadsheet.

use std::path::Path;

use serde::Serialize;

use crate::error::AppError;
use crate::io::table::ensure_parent_dir;
use crate::report::Report;

#[derive(Debug, Serialize)]
struct RankingRow<'a> {
    rank: usize,
    model_id: u32,
    formula: &'a str,
    description: &'a str,
    n_train: usize,
    n_test: usize,
    accuracy: f64,
    baseline_accuracy: f64,
    auc: Option<f64>,
    log_loss: f64,
    log_likelihood: f64,
    aic: f64,
    bic: f64,
    pseudo_r2: f64,
    iterations: usize,
}

/// Write the ranking table to `path`.
pub fn write_ranking_csv(path: &Path, report: &Report) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))?;

    for m in &report.models {
        let fit = &m.fit;
        writer
            .serialize(RankingRow {
                rank: m.rank,
                model_id: fit.model_id,
                formula: &fit.formula,
                description: fit.description.as_deref().unwrap_or(""),
                n_train: fit.quality.n_obs,
                n_test: fit.test.n_obs,
                accuracy: fit.test.accuracy,
                baseline_accuracy: fit.test.baseline_accuracy,
                auc: fit.test.auc,
                log_loss: fit.test.log_loss,
                log_likelihood: fit.quality.log_likelihood,
                aic: fit.quality.aic,
                bic: fit.quality.bic,
                pseudo_r2: fit.quality.pseudo_r2,
                iterations: fit.quality.iterations,
            })
            .map_err(|e| AppError::input(format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush export CSV '{}': {e}", path.display())))?;
    tracing::info!(path = %path.display(), rows = report.models.len(), "wrote ranking CSV");
    Ok(())
}
