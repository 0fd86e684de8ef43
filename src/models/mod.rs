//! Binomial model building blocks.
//!
//! Fitting code only sees dense matrices; this module turns a formula plus a
//! table into those matrices and maps coefficients back to probabilities.

pub mod design;

pub use design::*;
