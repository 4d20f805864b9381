//! Concurrent home of all dimension tables

use dashmap::DashMap;
use medallion_types::{DimensionKind, DimensionRow, SurrogateKey};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::table::DimensionTable;

/// Natural key → surrogate key indexes of every dimension
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionLookups {
    tables: HashMap<DimensionKind, HashMap<String, SurrogateKey>>,
}

impl DimensionLookups {
    pub fn resolve(&self, kind: DimensionKind, natural_key: &str) -> Option<SurrogateKey> {
        self.tables.get(&kind).and_then(|t| t.get(natural_key)).copied()
    }

    pub fn insert(&mut self, kind: DimensionKind, natural_key: String, key: SurrogateKey) {
        self.tables.entry(kind).or_default().insert(natural_key, key);
    }

    pub fn len(&self, kind: DimensionKind) -> usize {
        self.tables.get(&kind).map(HashMap::len).unwrap_or(0)
    }
}

/// Dimension tables, each behind its own exclusive async lock
///
/// Conformance of one dimension holds that table's lock for the whole batch,
/// so upserts into a dimension are serialized while distinct dimensions
/// proceed in parallel.
#[derive(Debug, Default)]
pub struct DimensionStore {
    tables: DashMap<DimensionKind, Arc<Mutex<DimensionTable>>>,
}

impl DimensionStore {
    pub fn new() -> Self {
        let store = Self::default();
        for kind in DimensionKind::ALL {
            store
                .tables
                .insert(kind, Arc::new(Mutex::new(DimensionTable::new(kind))));
        }
        store
    }

    /// Rebuild from a snapshot; dimensions missing from it start empty
    pub fn from_snapshot(snapshot: BTreeMap<DimensionKind, DimensionTable>) -> Self {
        let store = Self::new();
        for (kind, table) in snapshot {
            store.tables.insert(kind, Arc::new(Mutex::new(table)));
        }
        store
    }

    fn handle(&self, kind: DimensionKind) -> Arc<Mutex<DimensionTable>> {
        self.tables
            .entry(kind)
            .or_insert_with(|| Arc::new(Mutex::new(DimensionTable::new(kind))))
            .value()
            .clone()
    }

    /// Exclusive access to one dimension table
    pub async fn lock(&self, kind: DimensionKind) -> OwnedTableGuard {
        let handle = self.handle(kind);
        OwnedTableGuard {
            guard: handle.lock_owned().await,
        }
    }

    /// Copy of every table, in dimension order
    pub async fn snapshot(&self) -> BTreeMap<DimensionKind, DimensionTable> {
        let mut out = BTreeMap::new();
        for kind in DimensionKind::ALL {
            let table = self.lock(kind).await;
            out.insert(kind, table.clone());
        }
        out
    }

    pub async fn lookups(&self) -> DimensionLookups {
        let mut lookups = DimensionLookups::default();
        for kind in DimensionKind::ALL {
            let table = self.lock(kind).await;
            for (natural_key, key) in table.natural_keys() {
                lookups.insert(kind, natural_key.clone(), *key);
            }
        }
        lookups
    }

    pub async fn row(&self, kind: DimensionKind, key: SurrogateKey) -> Option<DimensionRow> {
        self.lock(kind).await.get(key).cloned()
    }
}

/// Owned lock guard over a dimension table
pub struct OwnedTableGuard {
    guard: OwnedMutexGuard<DimensionTable>,
}

impl std::ops::Deref for OwnedTableGuard {
    type Target = DimensionTable;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl std::ops::DerefMut for OwnedTableGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
