//! Medallion transformation core
//!
//! This crate turns landed Bronze row batches into a conformed Silver star
//! schema and a set of Gold aggregates:
//! - [`normalizer`] validates and coerces raw rows, quarantining bad ones
//! - [`conformer`] deduplicates reference entities into surrogate-keyed dimensions
//! - [`fact`] resolves metric entries into fingerprinted facts
//! - [`aggregation`] recomputes Gold partitions from the fact table
//! - [`pipeline`] sequences the stages, checkpoints and reports each run

pub mod aggregation;
pub mod conformer;
pub mod error;
pub mod fact;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod state;
pub mod warehouse;
pub mod watermark;

// Re-export commonly used types
pub use aggregation::{AggregationEngine, AggregationStrategy, GoldStore, PartitionSet};
pub use conformer::{ConformResult, ConformStats, DimensionConformer, DimensionStore};
pub use error::{
    ProcessorError, Result as ProcessorResult, RowError, StageFatalError, StateError,
};
pub use fact::{FactBuildResult, FactBuilder, FactTable};
pub use normalizer::{Normalized, NormalizedBatch, RecordNormalizer};
pub use pipeline::{PipelineBuilder, PipelineOrchestrator, RunReport, RunState};
pub use state::{MemoryStateBackend, SledConfig, SledStateBackend, StateBackend};
pub use warehouse::{Warehouse, WarehouseSnapshot};
pub use watermark::{InputWatermark, WatermarkLedger};
