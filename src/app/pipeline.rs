//! Shared pipeline logic used by the `run`, `clean` and `validate` commands.
//!
//! raw load -> validate -> clean -> validate -> features -> write
//! -> split -> fit (parallel) -> rank
//!
//! The command handlers only decide what to print and export.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::config::Parameters;
use crate::data::{
    ValidationReport, build_features, clean_table, ensure_valid, train_test_split, validate_table,
};
use crate::domain::{ModelSpec, Table};
use crate::error::AppError;
use crate::fit::{FitSettings, fit_all};
use crate::io::create_table_handler;
use crate::models::response_values;
use crate::report::{DatasetSummary, Report};

/// Validated, cleaned and feature-enriched data of one run.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub raw_shape: [usize; 2],
    pub clean: Table,
    pub processed: Table,
}

/// Load the raw table and check it against `schema.raw_data`.
pub fn validate_raw(params: &Parameters) -> Result<(Table, ValidationReport), AppError> {
    let handler = create_table_handler(params.pipeline.raw_data_format, params.pipeline.data_backend);
    let raw = handler.load(&params.path.raw_data)?;
    let report = validate_table(&raw, &params.schema.raw_data, "raw_data");
    Ok((raw, report))
}

/// Validate, clean, derive features, and write `clean_data` and `processed_data`.
pub fn prepare_data(params: &Parameters) -> Result<PreparedData, AppError> {
    let backend = params.pipeline.data_backend;
    let raw_handler = create_table_handler(params.pipeline.raw_data_format, backend);

    tracing::debug!(format = ?raw_handler.format(), path = %params.path.raw_data.display(), "loading raw data");
    let raw = raw_handler.load(&params.path.raw_data)?;
    ensure_valid(&raw, &params.schema.raw_data, "raw_data")?;

    let clean = clean_table(&raw)?;
    ensure_valid(&clean, &params.schema.clean_data, "clean_data")?;
    raw_handler.save(&clean, &params.path.clean_data)?;

    let processed = build_features(&clean)?;
    check_response(&processed, &params.modelling.response)?;
    create_table_handler(params.pipeline.processed_format, backend).save(&processed, &params.path.processed_data)?;

    tracing::info!(
        clean = %params.path.clean_data.display(),
        processed = %params.path.processed_data.display(),
        "wrote prepared data"
    );

    let (rows, cols) = raw.shape();
    Ok(PreparedData {
        raw_shape: [rows, cols],
        clean,
        processed,
    })
}

/// Execute the full pipeline for `models` and return the ranked report.
///
/// A run where every model failed still returns its report; callers decide
/// how to surface `NoModelsFitted`.
pub fn run_pipeline(params: &Parameters, models: &[ModelSpec]) -> Result<Report, AppError> {
    let prepared = prepare_data(params)?;

    let modelling = &params.modelling;
    let split = train_test_split(&prepared.processed, modelling.test_size, modelling.random_state)?;

    let settings = FitSettings::new(params.pipeline.model_backend, modelling);
    tracing::info!(
        models = models.len(),
        backend = params.pipeline.model_backend.display_name(),
        "fitting models"
    );
    let run = fit_all(models, &split, &settings)?;

    let dataset = DatasetSummary {
        raw_shape: prepared.raw_shape,
        clean_shape: shape(&prepared.clean),
        processed_shape: shape(&prepared.processed),
        n_train: split.train.n_rows(),
        n_test: split.test.n_rows(),
    };
    Ok(Report::new(
        run,
        params.pipeline.model_backend,
        modelling.rank_by,
        dataset,
        Utc::now(),
    ))
}

/// Models selected on the command line, or all of them. Repeated ids select
/// the model once.
pub fn select_models(params: &Parameters, ids: &[u32]) -> Result<Vec<ModelSpec>, AppError> {
    if ids.is_empty() {
        return Ok(params.models.clone());
    }
    let mut seen = BTreeSet::new();
    ids.iter()
        .filter(|&&id| seen.insert(id))
        .map(|&id| {
            params
                .model(id)
                .cloned()
                .ok_or_else(|| AppError::input(format!("Model {id} is not defined in the parameter file.")))
        })
        .collect()
}

/// A report without a single fitted model is a failed run.
pub fn ensure_fitted(report: &Report) -> Result<(), AppError> {
    if report.models.is_empty() {
        return Err(AppError::NoModelsFitted {
            failed: report.failures.len(),
        });
    }
    Ok(())
}

fn check_response(table: &Table, response: &str) -> Result<(), AppError> {
    let column = table.column(response).ok_or_else(|| AppError::InvalidResponse {
        field: response.to_string(),
        reason: "column not found".to_string(),
    })?;
    let present: Vec<usize> = (0..table.n_rows()).filter(|&r| !column.data.is_missing(r)).collect();
    response_values(table, response, &present).map(|_| ())
}

fn shape(table: &Table) -> [usize; 2] {
    let (rows, cols) = table.shape();
    [rows, cols]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parameters;
    use crate::config::tests::PARAMS;

    #[test]
    fn select_models_rejects_unknown_ids() {
        let params = Parameters::from_toml_str(PARAMS).unwrap();
        assert_eq!(select_models(&params, &[]).unwrap().len(), params.models.len());
        assert_eq!(select_models(&params, &[2]).unwrap()[0].id, 2);
        let err = select_models(&params, &[42]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn repeated_ids_select_a_model_once() {
        let params = Parameters::from_toml_str(PARAMS).unwrap();
        let ids: Vec<u32> = select_models(&params, &[2, 1, 2, 1])
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn report_without_fits_is_an_error() {
        use crate::domain::{ModelBackend, ModelFailure, RankBy};
        use crate::fit::ModelRun;
        use crate::report::tests::fit;

        let dataset = DatasetSummary {
            raw_shape: [4, 9],
            clean_shape: [4, 8],
            processed_shape: [4, 10],
            n_train: 3,
            n_test: 1,
        };
        let failed = ModelRun {
            fits: vec![],
            failures: vec![ModelFailure {
                model_id: 1,
                error: AppError::convergence(1, "diverged"),
            }],
        };
        let report = Report::new(failed, ModelBackend::Glm, RankBy::Accuracy, dataset, Utc::now());
        let err = ensure_fitted(&report).unwrap_err();
        assert!(matches!(err, AppError::NoModelsFitted { failed: 1 }));
        assert_eq!(err.exit_code(), 4);

        let fitted = ModelRun {
            fits: vec![fit(1, 0.8, 100.0)],
            failures: vec![],
        };
        let report = Report::new(fitted, ModelBackend::Glm, RankBy::Accuracy, dataset, Utc::now());
        assert!(ensure_fitted(&report).is_ok());
    }
}
