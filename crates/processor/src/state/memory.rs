//! In-memory state backend implementation

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use super::backend::StateBackend;
use crate::error::StateResult;

/// Operation counters of a [`MemoryStateBackend`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBackendStats {
    pub total_entries: usize,
    pub get_count: u64,
    pub put_count: u64,
    pub delete_count: u64,
}

/// In-memory state backend using DashMap
///
/// Suited to tests and single-shot runs where the warehouse does not need to
/// survive a restart. Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryStateBackend {
    data: Arc<DashMap<Vec<u8>, Vec<u8>>>,
    gets: Arc<AtomicU64>,
    puts: Arc<AtomicU64>,
    deletes: Arc<AtomicU64>,
}

impl MemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> MemoryBackendStats {
        MemoryBackendStats {
            total_entries: self.data.len(),
            get_count: self.gets.load(Ordering::Relaxed),
            put_count: self.puts.load(Ordering::Relaxed),
            delete_count: self.deletes.load(Ordering::Relaxed),
        }
    }

    /// Approximate bytes held by keys and values
    pub fn memory_usage(&self) -> usize {
        self.data
            .iter()
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }
}

#[async_trait]
impl StateBackend for MemoryStateBackend {
    async fn get(&self, key: &[u8]) -> StateResult<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        let value = self.data.get(key).map(|entry| entry.value().clone());
        trace!(key_len = key.len(), hit = value.is_some(), "memory get");
        Ok(value)
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StateResult<()> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        trace!(key_len = key.len(), value_len = value.len(), "memory put");
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> StateResult<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.data.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &[u8]) -> StateResult<Vec<Vec<u8>>> {
        let mut keys: Vec<Vec<u8>> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn count(&self) -> StateResult<usize> {
        Ok(self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::backend::tests::*;

    #[tokio::test]
    async fn test_memory_backend_basic_ops() {
        test_backend_basic_ops(MemoryStateBackend::new()).await;
    }

    #[tokio::test]
    async fn test_memory_backend_list_keys() {
        test_backend_list_keys(MemoryStateBackend::new()).await;
    }

    #[tokio::test]
    async fn test_memory_backend_contains() {
        test_backend_contains(MemoryStateBackend::new()).await;
    }

    #[tokio::test]
    async fn test_memory_backend_stats_and_shared_clones() {
        let backend = MemoryStateBackend::new();
        let clone = backend.clone();

        backend.put(b"k", b"vvvv").await.unwrap();
        assert_eq!(clone.get(b"k").await.unwrap(), Some(b"vvvv".to_vec()));

        let stats = backend.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.put_count, 1);
        assert_eq!(stats.get_count, 1);
        assert_eq!(backend.memory_usage(), 5);
    }
}
