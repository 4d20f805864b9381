//! Silver fact construction

pub mod builder;
pub mod fingerprint;
pub mod table;

pub use builder::{FactBuildResult, FactBuildStats, FactBuilder};
pub use table::FactTable;
