//! Pipeline orchestration
//!
//! A run moves Bronze batches through normalization, dimension conformance,
//! fact building and Gold aggregation:
//! - Stages are strictly ordered and guarded by [`RunState`] transitions
//! - The warehouse is checkpointed after every stage
//! - Row-scoped problems are quarantined into the [`RunReport`]
//! - Replaying already processed input is a safe no-op
//!
//! # Example
//!
//! ```rust,no_run
//! use medallion_processor::pipeline::PipelineBuilder;
//! use medallion_types::{EntityType, RawBatch};
//! use chrono::Utc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut pipeline = PipelineBuilder::new().with_name("adhoc").build()?;
//! let batch = RawBatch::new("assets_2024_q1.json", Utc::now(), EntityType::Asset, Vec::new());
//! let report = pipeline.run(vec![batch]).await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod orchestrator;
pub mod report;
pub mod run_state;

pub use builder::PipelineBuilder;
pub use orchestrator::PipelineOrchestrator;
pub use report::{RunReport, StageCounts};
pub use run_state::RunState;
