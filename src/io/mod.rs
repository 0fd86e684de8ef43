//! Input/output helpers.
//!
//! - table readers/writers for CSV and JSON (`table`)
//! - ranking CSV export (`export`)
//! - JSON run report (`report`)

pub mod export;
pub mod report;
pub mod table;

pub use export::*;
pub use report::*;
pub use table::*;
