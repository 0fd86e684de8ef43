//! `passfit` library crate.
//!
//! The binary (`passfit`) is a thin wrapper around this library so that:
//!
//! - every pipeline stage is testable without spawning processes
//! - the stages can be reused from other front-ends (notebooks, services)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod formula;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
