//! Gold aggregation engine
//!
//! Recomputes affected partitions from all current facts. Strategies run on
//! separate tokio tasks; partitions within a strategy are independent.

use medallion_types::{DimensionKind, MetricEntryFact, PartitionKey, SurrogateKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::context::ReduceContext;
use super::store::{PartitionSet, PartitionUpdate};
use super::strategy::AggregationStrategy;
use crate::error::StageResult;
use crate::fact::FactTable;

/// Counters of one aggregation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationStats {
    pub recomputed: u64,
    pub removed: u64,
}

/// Replacement rows for every affected partition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationOutput {
    /// Ordered by strategy, then partition key
    pub updates: Vec<PartitionUpdate>,
    pub stats: AggregationStats,
}

/// Partitions touched by new facts or by facts whose dimensions changed
pub fn affected_partitions(
    new_facts: &[MetricEntryFact],
    changed: &BTreeMap<DimensionKind, BTreeSet<SurrogateKey>>,
    facts: &FactTable,
) -> PartitionSet {
    let mut affected = PartitionSet::new();
    let mut mark = |fact: &MetricEntryFact| {
        for strategy in AggregationStrategy::ALL {
            affected.insert(strategy, strategy.partition_of(fact));
        }
    };
    new_facts.iter().for_each(&mut mark);
    for (kind, keys) in changed {
        if keys.is_empty() {
            continue;
        }
        facts.referencing(*kind, keys).for_each(&mut mark);
    }
    affected
}

/// Every partition of every strategy
pub fn all_partitions(facts: &FactTable) -> PartitionSet {
    let mut partitions = PartitionSet::new();
    for fact in facts.iter() {
        for strategy in AggregationStrategy::ALL {
            partitions.insert(strategy, strategy.partition_of(fact));
        }
    }
    partitions
}

/// Runs the Gold strategies
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    strategies: Vec<AggregationStrategy>,
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self {
            strategies: AggregationStrategy::ALL.to_vec(),
        }
    }

    pub fn strategies(&self) -> &[AggregationStrategy] {
        &self.strategies
    }

    /// Recompute `affected` from `facts`
    pub async fn aggregate(
        &self,
        facts: Arc<FactTable>,
        context: Arc<ReduceContext>,
        affected: &PartitionSet,
    ) -> StageResult<AggregationOutput> {
        let mut handles = Vec::new();
        for strategy in &self.strategies {
            let Some(partitions) = affected.get(*strategy).cloned() else {
                continue;
            };
            let strategy = *strategy;
            let facts = Arc::clone(&facts);
            let context = Arc::clone(&context);
            handles.push(tokio::spawn(async move {
                recompute(strategy, &facts, &context, &partitions)
            }));
        }

        let mut output = AggregationOutput::default();
        for handle in handles {
            for update in handle.await? {
                if update.row.is_some() {
                    output.stats.recomputed += 1;
                } else {
                    output.stats.removed += 1;
                }
                output.updates.push(update);
            }
        }

        info!(
            recomputed = output.stats.recomputed,
            removed = output.stats.removed,
            "gold partitions recomputed"
        );
        Ok(output)
    }
}

fn recompute(
    strategy: AggregationStrategy,
    facts: &FactTable,
    context: &ReduceContext,
    partitions: &BTreeSet<PartitionKey>,
) -> Vec<PartitionUpdate> {
    // FactTable iterates in fingerprint order, so each group is too
    let mut groups: BTreeMap<&PartitionKey, Vec<&MetricEntryFact>> =
        partitions.iter().map(|p| (p, Vec::new())).collect();
    for fact in facts.iter() {
        let partition = strategy.partition_of(fact);
        if let Some(group) = groups.get_mut(&partition) {
            group.push(fact);
        }
    }

    groups
        .into_iter()
        .map(|(partition, group)| {
            debug!(
                table = %strategy.table(),
                partition = %partition,
                facts = group.len(),
                "recomputing partition"
            );
            PartitionUpdate {
                table: strategy.table(),
                partition: partition.clone(),
                row: strategy.reduce(partition, &group, context),
            }
        })
        .collect()
}
