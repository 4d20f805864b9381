//! The Silver and Gold warehouse and its checkpoints
//!
//! A checkpoint is a single bincode-encoded [`WarehouseSnapshot`] written
//! under one key of a [`StateBackend`]. Every collection in the snapshot is
//! ordered, so identical warehouse contents encode to identical bytes.

use medallion_types::{DimensionKind, MetricEntryFact};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregation::{GoldStore, PartitionSet, PartitionUpdate};
use crate::conformer::{DimensionStore, DimensionTable};
use crate::error::{StageFatalError, StageResult};
use crate::fact::FactTable;
use crate::state::StateBackend;
use crate::watermark::{InputWatermark, WatermarkLedger};

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable image of the whole warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseSnapshot {
    pub version: u32,
    pub dimensions: BTreeMap<DimensionKind, DimensionTable>,
    pub facts: FactTable,
    pub gold: GoldStore,
    pub ledger: WatermarkLedger,
    /// Gold partitions still awaiting recomputation
    pub pending: PartitionSet,
}

impl WarehouseSnapshot {
    pub fn encode(&self) -> StageResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StageFatalError::SchemaCorruption {
            key: "warehouse".to_string(),
            reason: format!("encode failed: {}", e),
        })
    }

    pub fn decode(key: &str, bytes: &[u8]) -> StageResult<Self> {
        let snapshot: Self =
            bincode::deserialize(bytes).map_err(|e| StageFatalError::SchemaCorruption {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StageFatalError::SchemaCorruption {
                key: key.to_string(),
                reason: format!(
                    "unsupported snapshot version {} (expected {})",
                    snapshot.version, SNAPSHOT_VERSION
                ),
            });
        }
        Ok(snapshot)
    }
}

/// Live warehouse state owned by the orchestrator
#[derive(Debug)]
pub struct Warehouse {
    dimensions: Arc<DimensionStore>,
    facts: FactTable,
    gold: GoldStore,
    ledger: WatermarkLedger,
    pending: PartitionSet,
}

impl Default for Warehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl Warehouse {
    pub fn new() -> Self {
        Self {
            dimensions: Arc::new(DimensionStore::new()),
            facts: FactTable::new(),
            gold: GoldStore::new(),
            ledger: WatermarkLedger::new(),
            pending: PartitionSet::new(),
        }
    }

    pub fn from_snapshot(snapshot: WarehouseSnapshot) -> Self {
        Self {
            dimensions: Arc::new(DimensionStore::from_snapshot(snapshot.dimensions)),
            facts: snapshot.facts,
            gold: snapshot.gold,
            ledger: snapshot.ledger,
            pending: snapshot.pending,
        }
    }

    pub async fn snapshot(&self) -> WarehouseSnapshot {
        WarehouseSnapshot {
            version: SNAPSHOT_VERSION,
            dimensions: self.dimensions.snapshot().await,
            facts: self.facts.clone(),
            gold: self.gold.clone(),
            ledger: self.ledger.clone(),
            pending: self.pending.clone(),
        }
    }

    pub fn dimensions(&self) -> &Arc<DimensionStore> {
        &self.dimensions
    }

    pub fn facts(&self) -> &FactTable {
        &self.facts
    }

    pub fn gold(&self) -> &GoldStore {
        &self.gold
    }

    pub fn ledger(&self) -> &WatermarkLedger {
        &self.ledger
    }

    pub fn pending(&self) -> &PartitionSet {
        &self.pending
    }

    /// Append accepted facts; returns how many were new
    pub fn append_facts(&mut self, facts: impl IntoIterator<Item = MetricEntryFact>) -> usize {
        let mut added = 0;
        for fact in facts {
            if self.facts.insert(fact) {
                added += 1;
            }
        }
        added
    }

    /// Queue partitions for the next aggregation
    pub fn mark_pending(&mut self, partitions: PartitionSet) {
        self.pending.extend(partitions);
    }

    /// Apply recomputed partitions and clear the pending set
    pub fn apply_gold(&mut self, updates: Vec<PartitionUpdate>) {
        for update in updates {
            self.gold.apply(update);
        }
        self.pending = PartitionSet::new();
    }

    pub fn commit_watermark(&mut self, watermark: &InputWatermark) {
        self.ledger.commit(watermark);
    }

    /// Persist the warehouse under `key`
    pub async fn checkpoint(&self, backend: &dyn StateBackend, key: &str) -> StageResult<()> {
        let bytes = self.snapshot().await.encode()?;
        let size = bytes.len();
        backend.put(key.as_bytes(), &bytes).await?;
        debug!(key, size, "warehouse checkpointed");
        Ok(())
    }

    /// Load the warehouse stored under `key`, if any
    pub async fn restore(backend: &dyn StateBackend, key: &str) -> StageResult<Option<Self>> {
        let bytes = match backend.get(key.as_bytes()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let snapshot = WarehouseSnapshot::decode(key, &bytes)?;
        info!(
            key,
            facts = snapshot.facts.len(),
            runs = snapshot.ledger.runs(),
            "warehouse restored from checkpoint"
        );
        Ok(Some(Self::from_snapshot(snapshot)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateBackend;

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let backend = MemoryStateBackend::new();
        let mut warehouse = Warehouse::new();
        let mut watermark = InputWatermark::new();
        watermark.add_source("assets.json");
        warehouse.commit_watermark(&watermark);

        warehouse.checkpoint(&backend, "warehouse").await.unwrap();
        let restored = Warehouse::restore(&backend, "warehouse").await.unwrap().unwrap();
        assert_eq!(restored.snapshot().await, warehouse.snapshot().await);
        assert_eq!(restored.ledger().runs(), 1);
    }

    #[tokio::test]
    async fn test_restore_missing_key() {
        let backend = MemoryStateBackend::new();
        assert!(Warehouse::restore(&backend, "warehouse").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_schema_corruption() {
        let backend = MemoryStateBackend::new();
        backend.put(b"warehouse", b"\x01\x02garbage").await.unwrap();
        let err = Warehouse::restore(&backend, "warehouse").await.unwrap_err();
        assert!(matches!(err, StageFatalError::SchemaCorruption { .. }));
    }

    #[tokio::test]
    async fn test_snapshot_bytes_are_stable() {
        let warehouse = Warehouse::new();
        let a = warehouse.snapshot().await.encode().unwrap();
        let b = warehouse.snapshot().await.encode().unwrap();
        assert_eq!(a, b);
    }
}
