//! Attribute merge policy for competing dimension records

use medallion_config::MergePolicy;
use medallion_types::{DimensionRow, FieldValue, Provenance};
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;

/// Orders records by merge strength under the configured policy
///
/// The order is total, so the final winner for a natural key does not depend
/// on processing order.
#[derive(Debug, Clone, Default)]
pub struct MergeResolver {
    policy: MergePolicy,
}

impl MergeResolver {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    fn strength<'a>(
        &self,
        source_file: &'a str,
        order: (chrono::DateTime<chrono::Utc>, &'a str, u64),
    ) -> (Reverse<usize>, chrono::DateTime<chrono::Utc>, &'a str, u64) {
        (Reverse(self.policy.rank(source_file)), order.0, order.1, order.2)
    }

    /// Compare two records; `Greater` means `a` wins over `b`
    pub fn compare(&self, a: &Provenance, b: &Provenance) -> Ordering {
        self.strength(&a.source_file, a.merge_order())
            .cmp(&self.strength(&b.source_file, b.merge_order()))
    }

    /// Compare an incoming record against the stored winner
    pub fn compare_with_stored(&self, incoming: &Provenance, stored: &DimensionRow) -> Ordering {
        self.strength(&incoming.source_file, incoming.merge_order())
            .cmp(&self.strength(&stored.source_file, stored.merge_order()))
    }
}

/// Overlay incoming attributes onto the stored ones; absent attributes keep their value
pub fn overlay(
    stored: &BTreeMap<String, FieldValue>,
    incoming: &BTreeMap<String, FieldValue>,
) -> BTreeMap<String, FieldValue> {
    let mut merged = stored.clone();
    for (name, value) in incoming {
        merged.insert(name.clone(), value.clone());
    }
    merged
}
