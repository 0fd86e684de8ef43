//! Reporting: model ranking and the run report.
//!
//! - `rank_by = accuracy`: descending test accuracy
//! - `rank_by = aic`: ascending training AIC
//!
//! Exact ties are broken by ascending model id, so the order is total and
//! stable across runs.

pub mod format;

pub use format::*;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{FitResult, ModelBackend, ModelFailure, RankBy};
use crate::fit::ModelRun;

/// Shapes of the datasets the models were fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub raw_shape: [usize; 2],
    pub clean_shape: [usize; 2],
    pub processed_shape: [usize; 2],
    pub n_train: usize,
    pub n_test: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedModel {
    /// 1-based.
    pub rank: usize,
    #[serde(flatten)]
    pub fit: FitResult,
}

/// Everything a run produces, ready to print or export.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub model_backend: ModelBackend,
    pub rank_by: RankBy,
    pub dataset: DatasetSummary,
    pub models: Vec<RankedModel>,
    pub failures: Vec<ModelFailure>,
}

impl Report {
    pub fn new(
        run: ModelRun,
        model_backend: ModelBackend,
        rank_by: RankBy,
        dataset: DatasetSummary,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tool: "passfit".to_string(),
            generated_at,
            model_backend,
            rank_by,
            dataset,
            models: rank_models(run.fits, rank_by),
            failures: run.failures,
        }
    }

    pub fn best(&self) -> Option<&RankedModel> {
        self.models.first()
    }
}

/// Order fitted models for the report.
pub fn rank_models(mut fits: Vec<FitResult>, rank_by: RankBy) -> Vec<RankedModel> {
    fits.sort_by(|a, b| compare(a, b, rank_by));
    fits.into_iter()
        .enumerate()
        .map(|(i, fit)| RankedModel { rank: i + 1, fit })
        .collect()
}

fn compare(a: &FitResult, b: &FitResult, rank_by: RankBy) -> Ordering {
    let primary = match rank_by {
        RankBy::Accuracy => b.test.accuracy.total_cmp(&a.test.accuracy),
        RankBy::Aic => a.quality.aic.total_cmp(&b.quality.aic),
    };
    primary.then(a.model_id.cmp(&b.model_id))
}
