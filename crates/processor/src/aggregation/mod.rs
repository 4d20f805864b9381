//! Gold aggregation
//!
//! Gold tables are derived from the Silver fact table and the dimension
//! attributes. The engine never adjusts a row incrementally: every affected
//! partition is recomputed from all of its current facts and replaces the
//! previous row.
//!
//! # Example
//!
//! ```rust,no_run
//! use medallion_processor::aggregation::{all_partitions, AggregationEngine, GoldStore, ReduceContext};
//! use medallion_processor::fact::FactTable;
//! use std::sync::Arc;
//!
//! # async fn example(facts: FactTable) -> Result<(), Box<dyn std::error::Error>> {
//! let affected = all_partitions(&facts);
//! let output = AggregationEngine::new()
//!     .aggregate(Arc::new(facts), Arc::new(ReduceContext::default()), &affected)
//!     .await?;
//!
//! let mut gold = GoldStore::new();
//! for update in output.updates {
//!     gold.apply(update);
//! }
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod engine;
pub mod reducer;
pub mod store;
pub mod strategy;

pub use context::{DimensionView, ReduceContext};
pub use engine::{
    affected_partitions, all_partitions, AggregationEngine, AggregationOutput, AggregationStats,
};
pub use reducer::{LatestReducer, MeanReducer, Reducer, SumReducer};
pub use store::{GoldStore, PartitionSet, PartitionUpdate};
pub use strategy::AggregationStrategy;
