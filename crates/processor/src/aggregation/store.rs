//! Gold tables and the partitions awaiting recomputation

use medallion_types::{GoldRow, GoldTable, PartitionKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::strategy::AggregationStrategy;

/// Partitions to recompute, per strategy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSet {
    partitions: BTreeMap<AggregationStrategy, BTreeSet<PartitionKey>>,
}

impl PartitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, strategy: AggregationStrategy, partition: PartitionKey) -> bool {
        self.partitions.entry(strategy).or_default().insert(partition)
    }

    /// Union with another set
    pub fn extend(&mut self, other: PartitionSet) {
        for (strategy, keys) in other.partitions {
            self.partitions.entry(strategy).or_default().extend(keys);
        }
    }

    pub fn get(&self, strategy: AggregationStrategy) -> Option<&BTreeSet<PartitionKey>> {
        self.partitions.get(&strategy).filter(|keys| !keys.is_empty())
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (AggregationStrategy, &PartitionKey)> {
        self.partitions
            .iter()
            .flat_map(|(strategy, keys)| keys.iter().map(move |key| (*strategy, key)))
    }
}

/// Outcome of recomputing one partition
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionUpdate {
    pub table: GoldTable,
    pub partition: PartitionKey,
    /// `None` when the partition no longer has any facts
    pub row: Option<GoldRow>,
}

/// The five Gold tables, each keyed by partition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoldStore {
    tables: BTreeMap<GoldTable, BTreeMap<PartitionKey, GoldRow>>,
}

impl GoldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace (or remove) the row of one partition
    pub fn apply(&mut self, update: PartitionUpdate) {
        let table = self.tables.entry(update.table).or_default();
        match update.row {
            Some(row) => {
                table.insert(update.partition, row);
            }
            None => {
                table.remove(&update.partition);
            }
        }
    }

    pub fn get(&self, table: GoldTable, partition: &PartitionKey) -> Option<&GoldRow> {
        self.tables.get(&table).and_then(|rows| rows.get(partition))
    }

    /// Rows of one table in partition order
    pub fn rows(&self, table: GoldTable) -> impl Iterator<Item = &GoldRow> {
        self.tables.get(&table).into_iter().flat_map(|rows| rows.values())
    }

    pub fn len(&self, table: GoldTable) -> usize {
        self.tables.get(&table).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }
}
