//! Fitting every candidate model of a run.
//!
//! Models are independent, so they are fitted in parallel over the shared
//! read-only partitions. Outcomes are collected back in model-id order:
//!
//! - per-model failures (`UnknownCovariate`, `Convergence`) are recorded and
//!   the remaining models still fit
//! - any other error aborts the run

use rayon::prelude::*;

use crate::data::TrainTest;
use crate::domain::{FitResult, ModelFailure, ModelSpec};
use crate::error::AppError;
use crate::fit::fitter::{FitSettings, fit_model};

/// Fits and failures of one run, both in ascending model id.
#[derive(Debug, Clone, Default)]
pub struct ModelRun {
    pub fits: Vec<FitResult>,
    pub failures: Vec<ModelFailure>,
}

pub fn fit_all(models: &[ModelSpec], data: &TrainTest, settings: &FitSettings) -> Result<ModelRun, AppError> {
    let mut ordered: Vec<&ModelSpec> = models.iter().collect();
    ordered.sort_by_key(|m| m.id);

    let outcomes: Vec<(u32, Result<FitResult, AppError>)> = ordered
        .par_iter()
        .map(|spec| (spec.id, fit_model(spec, data, settings)))
        .collect();

    let mut run = ModelRun::default();
    for (model_id, outcome) in outcomes {
        match outcome {
            Ok(fit) => run.fits.push(fit),
            Err(error) if error.is_per_model() => {
                tracing::warn!(model_id, "model failed: {error}");
                run.failures.push(ModelFailure { model_id, error });
            }
            Err(error) => return Err(error),
        }
    }

    tracing::info!(fitted = run.fits.len(), failed = run.failures.len(), "models fitted");
    Ok(run)
}
