//! Data preparation stages.
//!
//! - schema validation (`validate`)
//! - raw -> clean transformation (`clean`) and derived features (`features`)
//! - seeded train/test split (`split`)
//! - synthetic raw sample (`sample`)

pub mod clean;
pub mod features;
pub mod records;
pub mod sample;
pub mod split;
pub mod validate;

pub use clean::*;
pub use features::*;
pub use records::*;
pub use split::*;
pub use validate::*;
