//! Bronze input rows, normalized records and quarantine entries

use crate::entity::EntityType;
use crate::value::{FieldValue, RawValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Flat mapping of field name to primitive raw value
pub type RawRow = BTreeMap<String, RawValue>;

/// One landed source file worth of rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBatch {
    /// Source file identifier
    pub source_file: String,
    /// When the file was landed
    pub ingested_at: DateTime<Utc>,
    /// Entity type of every row; derived from `source_file` when absent
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    pub rows: Vec<RawRow>,
}

impl RawBatch {
    pub fn new(
        source_file: impl Into<String>,
        ingested_at: DateTime<Utc>,
        entity_type: EntityType,
        rows: Vec<RawRow>,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            ingested_at,
            entity_type: Some(entity_type),
            rows,
        }
    }

    /// Explicit entity type, or the one encoded in the file name
    pub fn resolve_entity_type(&self) -> crate::Result<EntityType> {
        match self.entity_type {
            Some(entity_type) => Ok(entity_type),
            None => EntityType::from_file_name(&self.source_file),
        }
    }
}

/// Where a record came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub source_file: String,
    pub ingested_at: DateTime<Utc>,
    pub entity_type: EntityType,
    /// Zero-based position of the row within its source file
    pub row_ordinal: u64,
}

impl Provenance {
    /// `<source_file>#<row_ordinal>`
    pub fn locator(&self) -> String {
        format!("{}#{}", self.source_file, self.row_ordinal)
    }

    /// Total order used when merging competing records
    pub fn merge_order(&self) -> (DateTime<Utc>, &str, u64) {
        (self.ingested_at, self.source_file.as_str(), self.row_ordinal)
    }
}

/// A validated, type-coerced Bronze row
///
/// Immutable once produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub provenance: Provenance,
    pub fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    pub fn entity_type(&self) -> EntityType {
        self.provenance.entity_type
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Trimmed, rendered value of a field; `None` when absent or blank
    pub fn text(&self, field: &str) -> Option<String> {
        self.fields
            .get(field)
            .map(|v| v.render().trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// Why a row was diverted to quarantine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    MissingField,
    TypeMismatch,
    Unparseable,
    UnresolvedDimension,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::MissingField => "missing_field",
            ReasonCode::TypeMismatch => "type_mismatch",
            ReasonCode::Unparseable => "unparseable",
            ReasonCode::UnresolvedDimension => "unresolved_dimension",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stage that rejected a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineStage {
    Normalize,
    FactBuild,
}

/// A rejected row with its original payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineEntry {
    pub entity_type: EntityType,
    pub source_file: String,
    pub row_ordinal: u64,
    pub stage: QuarantineStage,
    pub reason: ReasonCode,
    pub detail: String,
    pub row: RawRow,
}
