//! Conformed Silver dimension rows

use crate::entity::DimensionKind;
use crate::value::FieldValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque surrogate identifier of a dimension row
///
/// Assigned once per `(dimension, natural key)` and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SurrogateKey(pub u64);

impl SurrogateKey {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurrogateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SurrogateKey {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// One row of a Silver dimension table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRow {
    pub kind: DimensionKind,
    pub surrogate_key: SurrogateKey,
    pub natural_key: String,
    /// Descriptive attributes, natural-key column excluded
    pub attributes: BTreeMap<String, FieldValue>,
    pub is_active: bool,
    /// Provenance of the record that last won the attribute merge
    pub source_file: String,
    pub source_timestamp: DateTime<Utc>,
    pub source_row: u64,
}

impl DimensionRow {
    pub fn attribute(&self, name: &str) -> Option<&FieldValue> {
        self.attributes.get(name)
    }

    /// Rendered attribute, empty when absent
    pub fn display(&self, name: &str) -> String {
        self.attributes
            .get(name)
            .map(FieldValue::render)
            .unwrap_or_default()
    }

    /// Merge order of the stored winner
    pub fn merge_order(&self) -> (DateTime<Utc>, &str, u64) {
        (self.source_timestamp, self.source_file.as_str(), self.source_row)
    }
}
