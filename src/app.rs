//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - loads the parameter file
//! - runs the requested pipeline stage
//! - prints reports and writes optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ConfigArgs, RunArgs, SampleArgs};
use crate::config::load_parameters;
use crate::data::sample::{SampleConfig, generate_sample_table};
use crate::error::AppError;
use crate::io::{create_table_handler, write_ranking_csv, write_report_json};
use crate::report::{format_run_summary, format_validation};

pub mod pipeline;

/// Entry point for the `passfit` binary.
pub fn run() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();

    // `passfit` and `passfit --config x.toml` behave like `passfit run ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Validate(args) => handle_validate(args),
        Command::Clean(args) => handle_clean(args),
        Command::Sample(args) => handle_sample(args),
        Command::Config(args) => handle_config(args),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    // Logs go to stderr so stdout stays clean for reports.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let params = load_parameters(&args.config.config)?;
    let models = pipeline::select_models(&params, &args.models)?;
    let report = pipeline::run_pipeline(&params, &models)?;

    println!("{}", format_run_summary(&report));

    if let Some(path) = &args.export {
        write_ranking_csv(path, &report)?;
    }
    if let Some(path) = &args.export_report {
        write_report_json(path, &report)?;
    }

    pipeline::ensure_fitted(&report)
}

fn handle_validate(args: ConfigArgs) -> Result<(), AppError> {
    let params = load_parameters(&args.config)?;
    let (_, report) = pipeline::validate_raw(&params)?;
    print!("{}", format_validation(std::slice::from_ref(&report)));
    report.into_result()
}

fn handle_clean(args: ConfigArgs) -> Result<(), AppError> {
    let params = load_parameters(&args.config)?;
    let prepared = pipeline::prepare_data(&params)?;
    let (clean_rows, clean_cols) = prepared.clean.shape();
    let (rows, cols) = prepared.processed.shape();
    println!(
        "clean_data: [{clean_rows}, {clean_cols}] -> {}",
        params.path.clean_data.display()
    );
    println!("processed_data: [{rows}, {cols}] -> {}", params.path.processed_data.display());
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let params = load_parameters(&args.config.config)?;
    let config = SampleConfig {
        rows: args.rows.unwrap_or(params.schema.raw_data.shape[0]),
        seed: args.seed.unwrap_or(params.modelling.random_state),
    };
    let out = args.out.unwrap_or_else(|| params.path.raw_data.clone());

    let table = generate_sample_table(&config)?;
    create_table_handler(params.pipeline.raw_data_format, params.pipeline.data_backend).save(&table, &out)?;
    println!("Wrote {} synthetic rows to {}", table.n_rows(), out.display());
    Ok(())
}

fn handle_config(args: ConfigArgs) -> Result<(), AppError> {
    let params = load_parameters(&args.config)?;
    print!("{}", params.to_toml_string()?);
    Ok(())
}

/// Rewrite argv so `passfit` defaults to `passfit run`.
///
/// Rules:
/// - `passfit`                        -> `passfit run`
/// - `passfit --config x.toml ...`    -> `passfit run --config x.toml ...`
/// - `passfit --help/--version/-h`    -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "validate" | "clean" | "sample" | "config");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_runs_the_pipeline() {
        assert_eq!(rewrite_args(args(&["passfit"])), args(&["passfit", "run"]));
        assert_eq!(
            rewrite_args(args(&["passfit", "--config", "x.toml"])),
            args(&["passfit", "run", "--config", "x.toml"])
        );
    }

    #[test]
    fn subcommands_and_help_are_untouched() {
        assert_eq!(rewrite_args(args(&["passfit", "clean"])), args(&["passfit", "clean"]));
        assert_eq!(rewrite_args(args(&["passfit", "--help"])), args(&["passfit", "--help"]));
    }
}
