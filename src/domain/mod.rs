//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`DataFormat`, `ModelBackend`, `RankBy`, ...)
//! - the in-memory `Table` and the typed raw/clean records
//! - fit outputs (`FitResult`, `FitQuality`, `TestMetrics`, etc.)

pub mod types;

pub use types::*;
