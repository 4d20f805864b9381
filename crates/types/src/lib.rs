//! Core types and data models for the medallion transformation core
//!
//! This crate provides the data structures shared by every stage of the
//! Bronze → Silver → Gold pipeline: raw rows and records, conformed dimension
//! rows, the metric-entry fact, and the Gold aggregate shapes.

pub mod dimensions;
pub mod entity;
pub mod errors;
pub mod facts;
pub mod gold;
pub mod records;
pub mod value;

pub use dimensions::{DimensionRow, SurrogateKey};
pub use entity::{DimensionKind, EntityType};
pub use errors::{ModelError, Result};
pub use facts::{DimensionKeys, FactFingerprint, Measures, MetricEntryFact};
pub use gold::{
    AssetMetricsRow, AssetUtilizationDailyRow, GoldRow, GoldTable, PartitionKey,
    ResourceEfficiencyRow, SecurityPostureRow, TeamCostMonthlyRow, WasteIndex,
};
pub use records::{
    Provenance, QuarantineEntry, QuarantineStage, RawBatch, RawRecord, RawRow, ReasonCode,
};
pub use value::{FieldKind, FieldValue, RawValue};
