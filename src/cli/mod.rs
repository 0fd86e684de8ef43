//! Command-line parsing for the module-outcome modelling pipeline.
//!
//! The goal of this module is to keep **argument parsing** separate from
//! **command dispatch** (`app`) and from the data/fitting code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::DEFAULT_PARAMS_PATH;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "passfit",
    version,
    about = "Validate, clean and split student module data, then fit and compare pass/fail models"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` applies otherwise.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the whole pipeline: validate, clean, split, fit every model, report.
    Run(RunArgs),
    /// Validate the raw data against its declared schema.
    Validate(ConfigArgs),
    /// Validate and clean the raw data, build features, write both outputs.
    Clean(ConfigArgs),
    /// Write a synthetic raw dataset that matches the raw schema.
    Sample(SampleArgs),
    /// Print the parameter file as it was understood.
    Config(ConfigArgs),
}

/// Location of the parameter file.
#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    /// Parameter file (TOML). Relative data paths resolve against its directory.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_PARAMS_PATH)]
    pub config: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Only fit these model ids (repeatable). Defaults to every model in the file.
    #[arg(short, long = "model", value_name = "ID")]
    pub models: Vec<u32>,

    /// Export the model ranking to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the full report (coefficients, metrics, failures) to JSON.
    #[arg(long = "export-report", value_name = "JSON")]
    pub export_report: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Number of rows (defaults to the raw schema's row count).
    #[arg(short = 'n', long)]
    pub rows: Option<usize>,

    /// Random seed (defaults to `modelling.random_state`).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output file (defaults to `path.raw_data`, written in `pipeline.raw_data_format`).
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_collects_repeated_model_ids() {
        let cli = Cli::parse_from(["passfit", "run", "--model", "1", "-m", "4", "--export", "r.csv"]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.models, vec![1, 4]);
                assert_eq!(args.config.config, PathBuf::from(DEFAULT_PARAMS_PATH));
                assert_eq!(args.export, Some(PathBuf::from("r.csv")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["passfit", "validate", "-vv", "--config", "p.toml"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Validate(ref a) if a.config == PathBuf::from("p.toml")));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
