//! Pipeline parameters loaded from a TOML file (`parameters.toml` by default).
//!
//! The file is parsed once into an immutable [`Parameters`] value. Loading
//! happens in two passes:
//!
//! 1. the raw TOML document is checked for every required key, so a missing
//!    key is reported by its dotted name (`modelling.response`)
//! 2. the document is decoded into typed sections; model formulas are parsed
//!    here, so a bad formula never reaches the fitter
//!
//! Unknown keys are ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::validate::Schema;
use crate::domain::{DataBackend, DataFormat, ModelBackend, ModelSpec, RankBy};
use crate::error::AppError;
use crate::formula::Formula;

/// Default location of the parameter file.
pub const DEFAULT_PARAMS_PATH: &str = "parameters.toml";

const REQUIRED_FIELDS: [&str; 21] = [
    "pipeline.raw_data_format",
    "pipeline.processed_format",
    "pipeline.data_backend",
    "pipeline.model_backend",
    "path.raw_data",
    "path.clean_data",
    "path.processed_data",
    "schema.raw_data.shape",
    "schema.raw_data.num_missing",
    "schema.raw_data.features",
    "schema.clean_data.shape",
    "schema.clean_data.num_missing",
    "schema.clean_data.features",
    "modelling.response",
    "modelling.test_size",
    "modelling.random_state",
    "models",
    // Sections themselves, so a missing section is named before its keys.
    "pipeline",
    "path",
    "schema",
    "modelling",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSection {
    pub raw_data_format: DataFormat,
    pub processed_format: DataFormat,
    pub data_backend: DataBackend,
    pub model_backend: ModelBackend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSection {
    pub raw_data: PathBuf,
    pub clean_data: PathBuf,
    pub processed_data: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSection {
    pub raw_data: Schema,
    pub clean_data: Schema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModellingSection {
    pub response: String,
    /// Fraction of rows held out for testing, in `(0, 1)`.
    pub test_size: f64,
    pub random_state: u64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// L2 strength for the `penalized` backend.
    #[serde(default = "default_penalty")]
    pub penalty: f64,
    /// Probability at or above which a prediction counts as a pass.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub rank_by: RankBy,
}

fn default_max_iter() -> usize {
    100
}

fn default_tolerance() -> f64 {
    1e-8
}

fn default_penalty() -> f64 {
    1.0
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub formula_str: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// On-disk shape of the parameter file, before formulas are parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawParameters {
    pub pipeline: PipelineSection,
    pub path: PathSection,
    pub schema: SchemaSection,
    pub modelling: ModellingSection,
    pub models: BTreeMap<String, ModelEntry>,
}

/// Fully decoded pipeline parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameters", into = "RawParameters")]
pub struct Parameters {
    pub pipeline: PipelineSection,
    pub path: PathSection,
    pub schema: SchemaSection,
    pub modelling: ModellingSection,
    /// Sorted by ascending id.
    pub models: Vec<ModelSpec>,
}

impl TryFrom<RawParameters> for Parameters {
    type Error = String;

    fn try_from(raw: RawParameters) -> Result<Self, Self::Error> {
        validate_modelling(&raw.modelling)?;

        if raw.models.is_empty() {
            return Err("`models` declares no model.".to_string());
        }

        let mut models = Vec::with_capacity(raw.models.len());
        for (key, entry) in raw.models {
            let id = key
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| format!("Model id `{key}` is not a positive integer."))?;
            let formula = Formula::parse(&entry.formula_str).map_err(|e| format!("Model {id}: {e}"))?;
            if formula.response != raw.modelling.response {
                return Err(format!(
                    "Model {id}: formula response `{}` does not match modelling.response `{}`.",
                    formula.response, raw.modelling.response
                ));
            }
            models.push(ModelSpec {
                id,
                formula,
                description: entry.description,
            });
        }
        models.sort_by_key(|m| m.id);
        if models.windows(2).any(|w| w[0].id == w[1].id) {
            return Err("Duplicate model id.".to_string());
        }

        Ok(Parameters {
            pipeline: raw.pipeline,
            path: raw.path,
            schema: raw.schema,
            modelling: raw.modelling,
            models,
        })
    }
}

impl From<Parameters> for RawParameters {
    fn from(params: Parameters) -> Self {
        let models = params
            .models
            .into_iter()
            .map(|m| {
                (
                    m.id.to_string(),
                    ModelEntry {
                        formula_str: m.formula.to_string(),
                        description: m.description,
                    },
                )
            })
            .collect();

        RawParameters {
            pipeline: params.pipeline,
            path: params.path,
            schema: params.schema,
            modelling: params.modelling,
            models,
        }
    }
}

fn validate_modelling(m: &ModellingSection) -> Result<(), String> {
    if !(m.test_size.is_finite() && m.test_size > 0.0 && m.test_size < 1.0) {
        return Err(format!("modelling.test_size must be in (0, 1), got {}.", m.test_size));
    }
    if m.max_iter == 0 {
        return Err("modelling.max_iter must be >= 1.".to_string());
    }
    if !(m.tolerance.is_finite() && m.tolerance > 0.0) {
        return Err("modelling.tolerance must be finite and > 0.".to_string());
    }
    if !(m.penalty.is_finite() && m.penalty >= 0.0) {
        return Err("modelling.penalty must be finite and >= 0.".to_string());
    }
    if !(m.threshold.is_finite() && m.threshold > 0.0 && m.threshold < 1.0) {
        return Err("modelling.threshold must be in (0, 1).".to_string());
    }
    Ok(())
}

impl Parameters {
    /// Parse parameters from TOML text. Relative paths are kept as written.
    pub fn from_toml_str(text: &str) -> Result<Self, AppError> {
        let doc: toml::Table = text
            .parse()
            .map_err(|e| AppError::config(format!("{e}")))?;

        ensure_required_fields(&doc)?;

        toml::Value::Table(doc)
            .try_into()
            .map_err(|e: toml::de::Error| AppError::config(e.message().to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, AppError> {
        toml::to_string_pretty(self).map_err(|e| AppError::config(format!("Failed to serialize parameters: {e}")))
    }

    /// Resolve relative data paths against `base` (usually the config file's directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.path.raw_data,
            &mut self.path.clean_data,
            &mut self.path.processed_data,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn model(&self, id: u32) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.id == id)
    }
}

/// Read and decode a parameter file, resolving data paths relative to it.
pub fn load_parameters(path: &Path) -> Result<Parameters, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::config(format!("Failed to read parameter file '{}': {e}", path.display()))
    })?;

    let mut params = Parameters::from_toml_str(&text)?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    params.resolve_paths(&base);

    tracing::debug!(
        path = %path.display(),
        models = params.models.len(),
        "loaded parameters"
    );
    Ok(params)
}

fn ensure_required_fields(doc: &toml::Table) -> Result<(), AppError> {
    let mut required: Vec<&str> = REQUIRED_FIELDS.to_vec();
    // Shorter paths first so `schema` is reported before `schema.raw_data.shape`.
    required.sort_by_key(|f| f.matches('.').count());

    for field in required {
        if lookup(doc, field).is_none() {
            return Err(AppError::MissingConfigField(field.to_string()));
        }
    }

    if let Some(models) = doc.get("models").and_then(toml::Value::as_table) {
        for (id, entry) in models {
            let has_formula = entry
                .as_table()
                .map(|t| t.contains_key("formula_str"))
                .unwrap_or(false);
            if !has_formula {
                return Err(AppError::MissingConfigField(format!("models.{id}.formula_str")));
            }
        }
    }

    Ok(())
}

fn lookup<'a>(doc: &'a toml::Table, dotted: &str) -> Option<&'a toml::Value> {
    let mut parts = dotted.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_table()?.get(part)?;
    }
    Some(current)
}
