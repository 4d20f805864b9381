//! A single Silver dimension table

use medallion_types::{DimensionKind, DimensionRow, SurrogateKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{StageFatalError, StageResult};

/// Rows of one dimension keyed by surrogate key, with a natural-key index
///
/// Surrogate keys are handed out from a per-table counter starting at 1 and
/// are never reused. The counter survives snapshots, so keys stay stable
/// across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionTable {
    kind: DimensionKind,
    next_key: u64,
    rows: BTreeMap<SurrogateKey, DimensionRow>,
    by_natural_key: BTreeMap<String, SurrogateKey>,
}

impl DimensionTable {
    pub fn new(kind: DimensionKind) -> Self {
        Self {
            kind,
            next_key: 1,
            rows: BTreeMap::new(),
            by_natural_key: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> DimensionKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn lookup(&self, natural_key: &str) -> Option<SurrogateKey> {
        self.by_natural_key.get(natural_key).copied()
    }

    pub fn get(&self, key: SurrogateKey) -> Option<&DimensionRow> {
        self.rows.get(&key)
    }

    /// Rows in surrogate-key order
    pub fn rows(&self) -> impl Iterator<Item = &DimensionRow> {
        self.rows.values()
    }

    /// Full natural-key index
    pub fn natural_keys(&self) -> &BTreeMap<String, SurrogateKey> {
        &self.by_natural_key
    }

    /// Insert-if-absent, else return the existing key
    ///
    /// `make_row` receives the freshly assigned key and is only invoked when
    /// the natural key is new. Returns the key and whether a row was inserted.
    pub fn resolve_or_insert<F>(&mut self, natural_key: &str, make_row: F) -> StageResult<(SurrogateKey, bool)>
    where
        F: FnOnce(SurrogateKey) -> DimensionRow,
    {
        if let Some(existing) = self.lookup(natural_key) {
            return Ok((existing, false));
        }
        let key = SurrogateKey(self.next_key);
        self.insert_new(natural_key, make_row(key))?;
        self.next_key += 1;
        Ok((key, true))
    }

    /// Insert a row whose key is derived from its content, e.g. the date dimension
    ///
    /// Leaves an existing row for the same natural key untouched.
    pub fn insert_keyed(&mut self, row: DimensionRow) -> StageResult<bool> {
        if self.lookup(&row.natural_key).is_some() {
            return Ok(false);
        }
        let natural_key = row.natural_key.clone();
        self.insert_new(&natural_key, row)?;
        Ok(true)
    }

    fn insert_new(&mut self, natural_key: &str, row: DimensionRow) -> StageResult<()> {
        let key = row.surrogate_key;
        if let Some(owner) = self.rows.get(&key) {
            return Err(StageFatalError::SurrogateKeyCollision {
                dimension: self.kind,
                key: key.value(),
                existing: owner.natural_key.clone(),
                incoming: natural_key.to_string(),
            });
        }
        self.by_natural_key.insert(natural_key.to_string(), key);
        self.rows.insert(key, row);
        Ok(())
    }

    /// Replace the stored row for an existing key; the surrogate key is fixed
    pub fn replace(&mut self, row: DimensionRow) -> StageResult<()> {
        match self.rows.get(&row.surrogate_key) {
            Some(stored) if stored.natural_key == row.natural_key => {
                self.rows.insert(row.surrogate_key, row);
                Ok(())
            }
            Some(stored) => Err(StageFatalError::SurrogateKeyCollision {
                dimension: self.kind,
                key: row.surrogate_key.value(),
                existing: stored.natural_key.clone(),
                incoming: row.natural_key,
            }),
            None => Err(StageFatalError::SchemaCorruption {
                key: self.kind.table_name(),
                reason: format!("no row for surrogate key {}", row.surrogate_key),
            }),
        }
    }
}
