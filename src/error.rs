//! Application error type.
//!
//! Every failure carries an exit code so `main` can stay a thin wrapper:
//!
//! - `2`: configuration or input problems (bad file, unreadable table)
//! - `3`: data that does not match its declared schema
//! - `4`: fitting problems

use thiserror::Error;

use crate::data::validate::Mismatch;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    #[error("Missing configuration field: `{0}`")]
    MissingConfigField(String),

    #[error("{0}")]
    Input(String),

    #[error("Schema mismatch in `{dataset}`: {}", join_mismatches(.mismatches))]
    SchemaMismatch {
        dataset: String,
        mismatches: Vec<Mismatch>,
    },

    #[error("Invalid response `{field}`: {reason}")]
    InvalidResponse { field: String, reason: String },

    #[error("Model {model_id}: unknown covariate `{field}`")]
    UnknownCovariate { model_id: u32, field: String },

    #[error("Model {model_id}: failed to converge: {reason}")]
    Convergence { model_id: u32, reason: String },

    #[error("No model could be fitted ({failed} failed).")]
    NoModelsFitted { failed: usize },
}

impl AppError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigParse(message.into())
    }

    pub fn convergence(model_id: u32, reason: impl Into<String>) -> Self {
        Self::Convergence {
            model_id,
            reason: reason.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigParse(_) | Self::MissingConfigField(_) | Self::Input(_) => 2,
            Self::SchemaMismatch { .. } | Self::InvalidResponse { .. } => 3,
            Self::UnknownCovariate { .. } | Self::Convergence { .. } | Self::NoModelsFitted { .. } => 4,
        }
    }

    /// Errors that only invalidate a single model; the run continues without it.
    pub fn is_per_model(&self) -> bool {
        matches!(self, Self::UnknownCovariate { .. } | Self::Convergence { .. })
    }
}

fn join_mismatches(mismatches: &[Mismatch]) -> String {
    let parts: Vec<String> = mismatches.iter().map(|m| m.to_string()).collect();
    parts.join("; ")
}
