//! Silver dimension conformer
//!
//! Deduplicates reference entities by natural key, assigns surrogate keys once,
//! and merges descriptive-attribute drift under the configured merge policy.
//!
//! ## Guarantees
//!
//! - A natural key maps to exactly one surrogate key per dimension.
//! - Surrogate keys are immutable once assigned and never reused.
//! - The final attributes of a row do not depend on processing order.
//! - The date dimension covers every event day of the current fact input.

pub mod calendar;
pub mod merge;
pub mod store;
pub mod table;

pub use merge::MergeResolver;
pub use store::{DimensionLookups, DimensionStore};
pub use table::DimensionTable;

use chrono::{DateTime, Utc};
use medallion_types::{DimensionKind, DimensionRow, EntityType, FieldValue, RawRecord, SurrogateKey};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{StageFatalError, StageResult};
use crate::schema::{EntitySchema, IS_ACTIVE};

/// Per-dimension conformance counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConformStats {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
}

impl ConformStats {
    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.unchanged
    }

    pub fn absorb(&mut self, other: ConformStats) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
    }
}

/// Result of conforming one entity type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConformResult {
    pub kind: Option<DimensionKind>,
    pub stats: ConformStats,
    /// Natural → surrogate keys touched by this batch
    pub lookup: BTreeMap<String, SurrogateKey>,
    /// Rows whose attributes changed this run
    pub changed: BTreeSet<SurrogateKey>,
}

/// Conforms normalized records into the dimension store
#[derive(Debug, Clone)]
pub struct DimensionConformer {
    store: Arc<DimensionStore>,
    resolver: MergeResolver,
}

impl DimensionConformer {
    pub fn new(store: Arc<DimensionStore>, resolver: MergeResolver) -> Self {
        Self { store, resolver }
    }

    pub fn store(&self) -> &Arc<DimensionStore> {
        &self.store
    }

    /// Conform all records of one dimension entity type
    ///
    /// Holds the dimension's exclusive lock for the whole batch. Records are
    /// applied from weakest to strongest merge order.
    pub async fn conform(
        &self,
        entity_type: EntityType,
        mut records: Vec<RawRecord>,
    ) -> StageResult<ConformResult> {
        let kind = entity_type.dimension_kind().ok_or_else(|| {
            StageFatalError::SchemaCorruption {
                key: entity_type.to_string(),
                reason: "entity type has no dimension".to_string(),
            }
        })?;
        let schema = EntitySchema::for_entity(entity_type);
        let natural_key_column = schema.natural_key.unwrap_or_default();

        records.sort_by(|a, b| self.resolver.compare(&a.provenance, &b.provenance));

        let mut result = ConformResult {
            kind: Some(kind),
            ..Default::default()
        };
        let mut table = self.store.lock(kind).await;

        for record in records {
            let Some(natural_key) = record.text(natural_key_column) else {
                warn!(
                    dimension = %kind,
                    locator = %record.provenance.locator(),
                    "record without natural key skipped"
                );
                continue;
            };
            let (attributes, is_active) = split_attributes(&record, natural_key_column);

            let (key, inserted) = table.resolve_or_insert(&natural_key, |key| DimensionRow {
                kind,
                surrogate_key: key,
                natural_key: natural_key.clone(),
                attributes: attributes.clone(),
                is_active,
                source_file: record.provenance.source_file.clone(),
                source_timestamp: record.provenance.ingested_at,
                source_row: record.provenance.row_ordinal,
            })?;
            result.lookup.insert(natural_key.clone(), key);

            if inserted {
                result.stats.inserted += 1;
                continue;
            }

            let stored = match table.get(key) {
                Some(row) => row.clone(),
                None => {
                    return Err(StageFatalError::SchemaCorruption {
                        key: kind.table_name(),
                        reason: format!("index points at missing key {}", key),
                    })
                }
            };

            match self.resolver.compare_with_stored(&record.provenance, &stored) {
                Ordering::Greater => {
                    let merged = DimensionRow {
                        attributes: merge::overlay(&stored.attributes, &attributes),
                        is_active,
                        source_file: record.provenance.source_file.clone(),
                        source_timestamp: record.provenance.ingested_at,
                        source_row: record.provenance.row_ordinal,
                        ..stored.clone()
                    };
                    let drifted =
                        merged.attributes != stored.attributes || merged.is_active != stored.is_active;
                    table.replace(merged)?;
                    if drifted {
                        result.stats.updated += 1;
                        result.changed.insert(key);
                    } else {
                        result.stats.unchanged += 1;
                    }
                }
                Ordering::Equal | Ordering::Less => {
                    result.stats.unchanged += 1;
                }
            }
        }

        info!(
            dimension = %kind,
            inserted = result.stats.inserted,
            updated = result.stats.updated,
            unchanged = result.stats.unchanged,
            rows = table.len(),
            "dimension conformed"
        );
        Ok(result)
    }

    /// Generate the calendar covering `[min, max]` of the given event times
    ///
    /// Dates already present are left untouched.
    pub async fn conform_calendar<I>(&self, event_times: I) -> StageResult<ConformResult>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        let mut result = ConformResult {
            kind: Some(DimensionKind::Date),
            ..Default::default()
        };

        let mut bounds: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
        for ts in event_times {
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(ts), hi.max(ts)),
                None => (ts, ts),
            });
        }
        let Some((lo, hi)) = bounds else {
            debug!("no event times, calendar unchanged");
            return Ok(result);
        };

        let mut table = self.store.lock(DimensionKind::Date).await;
        for date in calendar::date_range(lo.date_naive(), hi.date_naive()) {
            let row = calendar::calendar_row(date);
            let key = row.surrogate_key;
            result.lookup.insert(row.natural_key.clone(), key);
            if table.insert_keyed(row)? {
                result.stats.inserted += 1;
            } else {
                result.stats.unchanged += 1;
            }
        }

        info!(
            from = %lo.date_naive(),
            to = %hi.date_naive(),
            inserted = result.stats.inserted,
            "calendar conformed"
        );
        Ok(result)
    }
}

fn split_attributes(
    record: &RawRecord,
    natural_key_column: &str,
) -> (BTreeMap<String, FieldValue>, bool) {
    let mut attributes = record.fields.clone();
    attributes.remove(natural_key_column);
    let is_active = attributes
        .remove(IS_ACTIVE)
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    (attributes, is_active)
}
