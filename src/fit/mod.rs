//! Model fitting.
//!
//! Responsibilities:
//!
//! - fit one binomial model by IRLS and score it on the test partition (`fitter`)
//! - fit every configured model in parallel, keeping per-model failures (`selection`)

pub mod fitter;
pub mod selection;

pub use fitter::*;
pub use selection::*;
