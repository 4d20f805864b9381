//! Pipeline builder for fluent orchestrator configuration

use medallion_config::{MedallionConfig, MergePolicy};
use std::sync::Arc;

use super::orchestrator::PipelineOrchestrator;
use crate::error::Result;
use crate::state::{MemoryStateBackend, StateBackend};

/// Builder for [`PipelineOrchestrator`]
///
/// # Example
///
/// ```rust,no_run
/// use medallion_config::MergePolicy;
/// use medallion_processor::pipeline::PipelineBuilder;
///
/// # async fn example() -> anyhow::Result<()> {
/// let mut pipeline = PipelineBuilder::new()
///     .with_name("nightly")
///     .with_parallelism(8)
///     .with_merge_policy(MergePolicy::SourcePriority {
///         ranking: vec!["cmdb_".to_string()],
///     })
///     .build()?;
///
/// let report = pipeline.run(Vec::new()).await?;
/// println!("{}", report.to_json()?);
/// # Ok(())
/// # }
/// ```
pub struct PipelineBuilder {
    config: MedallionConfig,
    backend: Option<Arc<dyn StateBackend>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: MedallionConfig::default(),
            backend: None,
        }
    }

    /// Start from a loaded configuration
    pub fn with_config(mut self, config: MedallionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the pipeline name
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.pipeline.name = name.into();
        self
    }

    /// Set the number of dimensions conformed concurrently
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.config.pipeline.parallelism = parallelism;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.config.merge.policy = policy;
        self
    }

    /// Enable or disable per-stage checkpoints
    pub fn with_checkpointing(mut self, enabled: bool) -> Self {
        self.config.pipeline.checkpoint_enabled = enabled;
        self
    }

    pub fn with_checkpoint_key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.pipeline.checkpoint_key = key.into();
        self
    }

    /// Set the storage backend; defaults to an in-memory backend
    pub fn with_backend(mut self, backend: Arc<dyn StateBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validate the configuration and build over an empty warehouse
    pub fn build(self) -> Result<PipelineOrchestrator> {
        self.config.validate()?;
        let backend = self.backend_or_memory();
        Ok(PipelineOrchestrator::new(self.config, backend))
    }

    /// Validate the configuration and build over the last checkpoint
    pub async fn recover(self) -> Result<PipelineOrchestrator> {
        self.config.validate()?;
        let backend = self.backend_or_memory();
        PipelineOrchestrator::recover(self.config, backend).await
    }

    fn backend_or_memory(&self) -> Arc<dyn StateBackend> {
        self.backend
            .clone()
            .unwrap_or_else(|| Arc::new(MemoryStateBackend::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessorError;

    #[test]
    fn test_builder_applies_settings() {
        let pipeline = PipelineBuilder::new()
            .with_name("nightly")
            .with_parallelism(2)
            .with_checkpointing(false)
            .with_checkpoint_key("wh")
            .build()
            .unwrap();
        let config = pipeline.config();
        assert_eq!(config.pipeline.name, "nightly");
        assert_eq!(config.pipeline.parallelism, 2);
        assert!(!config.pipeline.checkpoint_enabled);
        assert_eq!(config.pipeline.checkpoint_key, "wh");
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = PipelineBuilder::new().with_parallelism(0).build();
        assert!(matches!(result, Err(ProcessorError::Configuration(_))));
    }
}
