//! CLI command implementations

pub mod run;
pub mod show;

pub use run::RunArgs;
pub use show::ShowArgs;

use medallion_processor::{MemoryStateBackend, SledConfig, SledStateBackend, StateBackend};
use std::path::Path;
use std::sync::Arc;

/// Sled backend under `state_dir`, or a throwaway in-memory backend
pub async fn open_backend(state_dir: Option<&Path>) -> anyhow::Result<Arc<dyn StateBackend>> {
    match state_dir {
        Some(dir) => {
            let backend = SledStateBackend::open(SledConfig::new(dir)).await?;
            Ok(Arc::new(backend))
        }
        None => Ok(Arc::new(MemoryStateBackend::new())),
    }
}
