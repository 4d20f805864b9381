//! The Silver metric-entry fact table

use medallion_types::{DimensionKind, FactFingerprint, MetricEntryFact, SurrogateKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Facts keyed by fingerprint; iteration order is fingerprint order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactTable {
    facts: BTreeMap<FactFingerprint, MetricEntryFact>,
}

impl FactTable {
    /// Warehouse name of the table
    pub const NAME: &'static str = "fact_metric_entry";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn contains(&self, fingerprint: &FactFingerprint) -> bool {
        self.facts.contains_key(fingerprint)
    }

    pub fn get(&self, fingerprint: &FactFingerprint) -> Option<&MetricEntryFact> {
        self.facts.get(fingerprint)
    }

    /// Insert a fact; an existing fingerprint is left as is
    pub fn insert(&mut self, fact: MetricEntryFact) -> bool {
        if self.facts.contains_key(&fact.fingerprint) {
            return false;
        }
        self.facts.insert(fact.fingerprint.clone(), fact);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricEntryFact> {
        self.facts.values()
    }

    /// Facts referencing any of the given rows of one dimension
    pub fn referencing<'a>(
        &'a self,
        kind: DimensionKind,
        keys: &'a BTreeSet<SurrogateKey>,
    ) -> impl Iterator<Item = &'a MetricEntryFact> + 'a {
        self.facts
            .values()
            .filter(move |fact| fact.keys.get(kind).is_some_and(|k| keys.contains(&k)))
    }
}
