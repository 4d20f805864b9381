//! Error types for the transformation core
//!
//! Errors fall into three tiers. [`RowError`]s are scoped to a single input row
//! and are converted into quarantine entries, never propagated.
//! [`StageFatalError`]s halt the current stage and surface to the caller
//! wrapped with the failing stage. [`StateError`]s come from the storage seam
//! and are mapped onto fatal stage errors by the orchestrator.

use medallion_types::{DimensionKind, ReasonCode};
use thiserror::Error;

use crate::pipeline::RunState;

/// Main processor error type
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// A pipeline stage failed fatally
    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: RunState,
        #[source]
        source: StageFatalError,
    },

    /// Fatal error raised outside a running stage
    #[error("fatal error: {0}")]
    Fatal(#[from] StageFatalError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(#[from] medallion_config::ConfigError),

    /// Model identifier errors
    #[error("model error: {0}")]
    Model(#[from] medallion_types::ModelError),
}

impl ProcessorError {
    /// Stage that failed, if any
    pub fn stage(&self) -> Option<RunState> {
        match self {
            ProcessorError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Conditions that halt a stage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageFatalError {
    /// The storage seam could not be reached
    #[error("storage unavailable: {details}")]
    StorageUnavailable { details: String },

    /// A persisted snapshot could not be decoded
    #[error("schema corruption in '{key}': {reason}")]
    SchemaCorruption { key: String, reason: String },

    /// Two natural keys resolved to the same surrogate key
    #[error("surrogate key collision in {dimension}: key {key} already owned by '{existing}', refused for '{incoming}'")]
    SurrogateKeyCollision {
        dimension: DimensionKind,
        key: u64,
        existing: String,
        incoming: String,
    },

    /// The run state machine refused a transition
    #[error("illegal stage transition from {from} to {to}")]
    IllegalTransition { from: RunState, to: RunState },

    /// A parallel worker panicked or was cancelled
    #[error("worker failed: {details}")]
    WorkerFailed { details: String },
}

impl From<StateError> for StageFatalError {
    fn from(err: StateError) -> Self {
        StageFatalError::StorageUnavailable {
            details: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for StageFatalError {
    fn from(err: tokio::task::JoinError) -> Self {
        StageFatalError::WorkerFailed {
            details: err.to_string(),
        }
    }
}

/// Row-scoped failures, recovered locally into quarantine entries
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    /// A required field is absent, null or blank
    #[error("required field '{field}' is missing")]
    MissingField { field: String },

    /// The raw value can never be coerced to the expected shape
    #[error("field '{field}' expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// Text of the right shape failed to parse
    #[error("field '{field}' value '{value}' is not a valid {expected}")]
    Unparseable {
        field: String,
        expected: String,
        value: String,
    },

    /// A foreign natural key has no dimension row
    #[error("no {dimension} row for natural key '{natural_key}'")]
    UnresolvedDimension {
        dimension: DimensionKind,
        natural_key: String,
    },
}

impl RowError {
    /// Reason code recorded on the quarantine entry
    pub fn reason(&self) -> ReasonCode {
        match self {
            RowError::MissingField { .. } => ReasonCode::MissingField,
            RowError::TypeMismatch { .. } => ReasonCode::TypeMismatch,
            RowError::Unparseable { .. } => ReasonCode::Unparseable,
            RowError::UnresolvedDimension { .. } => ReasonCode::UnresolvedDimension,
        }
    }
}

/// State backend operation errors
#[derive(Error, Debug)]
pub enum StateError {
    /// State backend storage error
    #[error("storage error in {backend_type}: {details}")]
    StorageError {
        backend_type: String,
        details: String,
    },
}

/// Result type alias for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Result type alias for stage operations
pub type StageResult<T> = std::result::Result<T, StageFatalError>;

/// Result type alias for row-scoped operations
pub type RowResult<T> = std::result::Result<T, RowError>;

/// Result type alias for state operations
pub type StateResult<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_reason_codes() {
        let err = RowError::MissingField {
            field: "serial_number".to_string(),
        };
        assert_eq!(err.reason(), ReasonCode::MissingField);
        assert!(err.to_string().contains("serial_number"));

        let err = RowError::UnresolvedDimension {
            dimension: DimensionKind::Asset,
            natural_key: "srv-9".to_string(),
        };
        assert_eq!(err.reason(), ReasonCode::UnresolvedDimension);
        assert_eq!(err.to_string(), "no asset row for natural key 'srv-9'");
    }

    #[test]
    fn test_state_error_maps_to_fatal() {
        let fatal: StageFatalError = StateError::StorageError {
            backend_type: "sled".to_string(),
            details: "io".to_string(),
        }
        .into();
        assert!(matches!(fatal, StageFatalError::StorageUnavailable { .. }));
        assert!(fatal.to_string().contains("sled"));
    }

    #[test]
    fn test_stage_error_display() {
        let err = ProcessorError::Stage {
            stage: RunState::Conforming,
            source: StageFatalError::StorageUnavailable {
                details: "disk gone".to_string(),
            },
        };
        assert_eq!(err.stage(), Some(RunState::Conforming));
        assert!(err.to_string().contains("conforming"));
    }
}
