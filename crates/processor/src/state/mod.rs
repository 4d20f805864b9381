//! State management for the warehouse
//!
//! This module provides the storage seam used to checkpoint the warehouse
//! between pipeline stages:
//!
//! - **StateBackend Trait**: byte-oriented async key-value interface
//! - **MemoryStateBackend**: DashMap-backed, for tests and one-shot runs
//! - **SledStateBackend**: persistent embedded storage
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use medallion_processor::state::{MemoryStateBackend, StateBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = MemoryStateBackend::new();
//!     backend.put(b"checkpoint:warehouse", b"snapshot").await?;
//!
//!     if let Some(data) = backend.get(b"checkpoint:warehouse").await? {
//!         println!("Retrieved {} bytes", data.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod memory;
pub mod sled_backend;

pub use backend::StateBackend;
pub use memory::{MemoryBackendStats, MemoryStateBackend};
pub use sled_backend::{SledConfig, SledStateBackend};

pub use crate::error::{StateError, StateResult};
