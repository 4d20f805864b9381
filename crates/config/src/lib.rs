//! Configuration management for the medallion transformation core

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedallionConfig {
    /// Run settings
    pub pipeline: PipelineConfig,

    /// Dimension attribute merge policy
    pub merge: MergeConfig,

    /// Waste classification thresholds
    pub efficiency: EfficiencyConfig,

    /// Security posture rules
    pub posture: PostureConfig,

    /// Observability settings
    pub observability: ObservabilityConfig,
}

impl MedallionConfig {
    /// Load configuration from defaults, an optional YAML file and the environment
    ///
    /// Environment variables are prefixed with `MEDALLION_` and nest with `__`,
    /// e.g. `MEDALLION_PIPELINE__PARALLELISM=8`.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed("MEDALLION_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Pipeline name required".to_string(),
            ));
        }

        if self.pipeline.parallelism == 0 {
            return Err(ConfigError::ValidationError(
                "Parallelism must be at least 1".to_string(),
            ));
        }

        if self.pipeline.checkpoint_enabled && self.pipeline.checkpoint_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "Checkpoint key required when checkpointing is enabled".to_string(),
            ));
        }

        if let MergePolicy::SourcePriority { ranking } = &self.merge.policy {
            if ranking.iter().any(|prefix| prefix.trim().is_empty()) {
                return Err(ConfigError::ValidationError(
                    "Source priority ranking contains an empty prefix".to_string(),
                ));
            }
        }

        self.efficiency.validate()?;
        self.posture.validate()?;

        Ok(())
    }
}

/// Run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pipeline name, used in logs
    pub name: String,

    /// Maximum number of concurrently conforming entity types
    pub parallelism: usize,

    /// Checkpoint the warehouse after every stage
    pub checkpoint_enabled: bool,

    /// Storage key of the warehouse checkpoint
    pub checkpoint_key: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "medallion".to_string(),
            parallelism: 4,
            checkpoint_enabled: true,
            checkpoint_key: "warehouse".to_string(),
        }
    }
}

/// How competing records for the same natural key are reconciled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergePolicy {
    /// Latest ingestion wins; ties fall to source file then row ordinal
    #[default]
    LastWriteWins,

    /// Ranked source-file prefixes, highest first
    SourcePriority { ranking: Vec<String> },
}

impl MergePolicy {
    /// Rank of a source file; lower is stronger, unranked files rank last
    pub fn rank(&self, source_file: &str) -> usize {
        match self {
            MergePolicy::LastWriteWins => 0,
            MergePolicy::SourcePriority { ranking } => ranking
                .iter()
                .position(|prefix| source_file.starts_with(prefix.as_str()))
                .unwrap_or(ranking.len()),
        }
    }
}

/// Merge settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub policy: MergePolicy,
}

/// Waste classification thresholds for `agg_resource_efficiency`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyConfig {
    /// Average CPU (percent) below which a costly asset is high waste
    pub high_waste_cpu_below: f64,

    /// Total cost above which a low-CPU asset is high waste
    pub high_waste_cost_above: f64,

    /// Average CPU (percent) below which an asset is potential waste
    pub potential_waste_cpu_below: f64,

    /// Average CPU (percent) above which an asset is optimized
    pub optimized_cpu_above: f64,
}

impl Default for EfficiencyConfig {
    fn default() -> Self {
        Self {
            high_waste_cpu_below: 5.0,
            high_waste_cost_above: 100.0,
            potential_waste_cpu_below: 20.0,
            optimized_cpu_above: 70.0,
        }
    }
}

impl EfficiencyConfig {
    fn validate(&self) -> Result<()> {
        let percent = [
            self.high_waste_cpu_below,
            self.potential_waste_cpu_below,
            self.optimized_cpu_above,
        ];
        if percent.iter().any(|v| !(0.0..=100.0).contains(v)) {
            return Err(ConfigError::ValidationError(
                "CPU thresholds must be within 0..=100".to_string(),
            ));
        }
        if self.high_waste_cost_above < 0.0 {
            return Err(ConfigError::ValidationError(
                "Cost threshold must be non-negative".to_string(),
            ));
        }
        if self.potential_waste_cpu_below > self.optimized_cpu_above {
            return Err(ConfigError::ValidationError(
                "Potential waste threshold exceeds optimized threshold".to_string(),
            ));
        }
        Ok(())
    }
}

/// One ordered posture matcher; empty lists match anything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureRule {
    pub tiers: Vec<String>,
    pub environments: Vec<String>,
    pub statuses: Vec<String>,
    pub label: String,
}

impl PostureRule {
    pub fn new(tiers: &[&str], environments: &[&str], statuses: &[&str], label: &str) -> Self {
        fn owned(values: &[&str]) -> Vec<String> {
            values.iter().map(|v| v.to_string()).collect()
        }
        Self {
            tiers: owned(tiers),
            environments: owned(environments),
            statuses: owned(statuses),
            label: label.to_string(),
        }
    }

    /// Case-insensitive match of a `(tier, environment, status)` triple
    pub fn matches(&self, tier: &str, environment: &str, status: &str) -> bool {
        fn any_of(candidates: &[String], value: &str) -> bool {
            candidates.is_empty() || candidates.iter().any(|c| c.eq_ignore_ascii_case(value))
        }
        any_of(&self.tiers, tier)
            && any_of(&self.environments, environment)
            && any_of(&self.statuses, status)
    }
}

/// Security posture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    /// Ordered rules; the first match wins
    pub rules: Vec<PostureRule>,

    /// Label when no rule matches
    pub default_label: String,

    /// Canonical environment names; anything else normalizes to the fallback
    pub allowed_environments: Vec<String>,

    pub fallback_environment: String,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                PostureRule::new(
                    &["Critical"],
                    &["Production"],
                    &["Inactive", "Decommissioned"],
                    "At Risk",
                ),
                PostureRule::new(&["Critical"], &[], &["Maintenance"], "Review"),
                PostureRule::new(&[], &["Production"], &["Decommissioned"], "Orphaned"),
            ],
            default_label: "Compliant".to_string(),
            allowed_environments: ["Production", "Staging", "Development", "UAT", "Sandbox"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fallback_environment: "Sandbox".to_string(),
        }
    }
}

impl PostureConfig {
    fn validate(&self) -> Result<()> {
        if let Some(index) = self.rules.iter().position(|r| r.label.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "Posture rule {} has no label",
                index
            )));
        }
        if self.default_label.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Default posture label required".to_string(),
            ));
        }
        if !self
            .allowed_environments
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&self.fallback_environment))
        {
            return Err(ConfigError::ValidationError(format!(
                "Fallback environment {} is not an allowed environment",
                self.fallback_environment
            )));
        }
        Ok(())
    }

    /// Canonical spelling of an environment name
    pub fn normalize_environment(&self, environment: &str) -> String {
        let trimmed = environment.trim();
        self.allowed_environments
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(trimmed))
            .unwrap_or(&self.fallback_environment)
            .clone()
    }

    /// Label of the first matching rule, or the default
    pub fn classify(&self, tier: &str, environment: &str, status: &str) -> String {
        self.rules
            .iter()
            .find(|rule| rule.matches(tier, environment, status))
            .map(|rule| rule.label.clone())
            .unwrap_or_else(|| self.default_label.clone())
    }
}

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,

    /// Enable structured JSON logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}
