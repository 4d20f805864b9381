//! Error types for the data model

use thiserror::Error;

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while interpreting model identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),
}
