use std::fs;
use std::path::{Path, PathBuf};

use passfit::app::pipeline::{ensure_fitted, prepare_data, run_pipeline, select_models};
use passfit::config::load_parameters;
use passfit::data::sample::{SampleConfig, generate_sample_table};
use passfit::domain::{DataBackend, DataFormat, RankBy};
use passfit::error::AppError;
use passfit::io::create_table_handler;

const SHIPPED_PARAMS: &str = include_str!("../parameters.toml");

/// Copy the shipped parameters into `dir`, applying `edits` as plain text
/// substitutions, and write a synthetic raw dataset where they point.
fn setup(dir: &Path, rows: usize, edits: &[(&str, &str)]) -> PathBuf {
    let mut text = SHIPPED_PARAMS.to_string();
    for (from, to) in edits {
        assert!(text.contains(from), "parameter text has no `{from}`");
        text = text.replace(from, to);
    }
    let params_path = dir.join("parameters.toml");
    fs::write(&params_path, text).unwrap();

    let params = load_parameters(&params_path).unwrap();
    let raw = generate_sample_table(&SampleConfig { rows, seed: 42 }).unwrap();
    create_table_handler(params.pipeline.raw_data_format, DataBackend::Memory)
        .save(&raw, &params.path.raw_data)
        .unwrap();
    params_path
}

#[test]
fn end_to_end_fits_and_ranks_every_model() {
    let dir = tempfile::tempdir().unwrap();
    let params_path = setup(dir.path(), 1796, &[]);
    let params = load_parameters(&params_path).unwrap();

    let models = select_models(&params, &[]).unwrap();
    let report = run_pipeline(&params, &models).unwrap();

    assert_eq!(report.dataset.raw_shape, [1796, 9]);
    assert_eq!(report.dataset.clean_shape, [1796, 8]);
    assert_eq!(report.dataset.processed_shape, [1796, 10]);
    assert_eq!(report.dataset.n_train, 1347);
    assert_eq!(report.dataset.n_test, 449);

    assert!(report.failures.is_empty(), "failures: {:?}", report.failures);
    assert_eq!(report.models.len(), 5);
    let mut ids: Vec<u32> = report.models.iter().map(|m| m.fit.model_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    for pair in report.models.windows(2) {
        let (a, b) = (&pair[0].fit, &pair[1].fit);
        assert!(
            a.test.accuracy > b.test.accuracy || (a.test.accuracy == b.test.accuracy && a.model_id < b.model_id),
            "models out of order: {} then {}",
            a.model_id,
            b.model_id
        );
    }
    for m in &report.models {
        assert_eq!(m.fit.quality.n_obs, 1347);
        assert_eq!(m.fit.test.n_obs, 449);
        assert!(m.fit.test.accuracy > 0.5);
        assert!(m.fit.quality.log_likelihood > m.fit.quality.null_log_likelihood);
    }

    // Cleaned and processed data were written and read back to the same shapes.
    let handler = create_table_handler(DataFormat::Csv, DataBackend::Memory);
    assert_eq!(handler.load(&params.path.clean_data).unwrap().shape(), (1796, 8));
    assert_eq!(handler.load(&params.path.processed_data).unwrap().shape(), (1796, 10));
}

#[test]
fn json_data_penalized_backend_ranked_by_aic() {
    let dir = tempfile::tempdir().unwrap();
    let params_path = setup(
        dir.path(),
        1796,
        &[
            ("raw_data_format = \"csv\"", "raw_data_format = \"json\""),
            ("processed_format = \"csv\"", "processed_format = \"json\""),
            ("model_backend = \"glm\"", "model_backend = \"penalized\""),
            ("rank_by = \"accuracy\"", "rank_by = \"aic\""),
            ("data/raw/students.csv", "data/raw/students.json"),
        ],
    );
    let params = load_parameters(&params_path).unwrap();
    assert_eq!(params.pipeline.raw_data_format, DataFormat::Json);

    let models = select_models(&params, &[1, 4]).unwrap();
    let report = run_pipeline(&params, &models).unwrap();
    assert_eq!(report.rank_by, RankBy::Aic);
    assert_eq!(report.models.len(), 2);
    assert!(report.models[0].fit.quality.aic <= report.models[1].fit.quality.aic);

    let coefficients = &report.models.iter().find(|m| m.fit.model_id == 4).unwrap().fit.coefficients;
    assert!(coefficients.iter().any(|c| c.name == "C(imd)[T.10-20%]"));
    assert!(!coefficients.iter().any(|c| c.name == "C(imd)[T.0-10%]"));
}

#[test]
fn unknown_covariate_fails_one_model_only() {
    let dir = tempfile::tempdir().unwrap();
    let params_path = setup(
        dir.path(),
        1796,
        &[("did_pass ~ cma_score + is_maths\"", "did_pass ~ cma_score + is_mathematics\"")],
    );
    let params = load_parameters(&params_path).unwrap();
    let report = run_pipeline(&params, &params.models).unwrap();

    assert_eq!(report.models.len(), 4);
    assert_eq!(report.failures.len(), 1);
    match &report.failures[0].error {
        AppError::UnknownCovariate { model_id, field } => {
            assert_eq!(*model_id, 3);
            assert_eq!(field, "is_mathematics");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn run_without_any_fitted_model_exits_with_code_4() {
    let dir = tempfile::tempdir().unwrap();
    // Every shipped formula starts with this covariate.
    let params_path = setup(dir.path(), 1796, &[("did_pass ~ cma_score", "did_pass ~ cma")]);
    let params = load_parameters(&params_path).unwrap();

    let report = run_pipeline(&params, &params.models).unwrap();
    assert!(report.models.is_empty());
    assert_eq!(report.failures.len(), 5);

    let err = ensure_fitted(&report).unwrap_err();
    assert!(matches!(err, AppError::NoModelsFitted { failed: 5 }));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn short_raw_table_fails_schema_validation() {
    let dir = tempfile::tempdir().unwrap();
    let params_path = setup(dir.path(), 1795, &[]);
    let params = load_parameters(&params_path).unwrap();

    let err = prepare_data(&params).unwrap_err();
    assert!(matches!(err, AppError::SchemaMismatch { ref dataset, .. } if dataset == "raw_data"));
    assert_eq!(err.exit_code(), 3);
    assert!(!params.path.clean_data.exists());
}
