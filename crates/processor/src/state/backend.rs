//! State backend trait definition
//!
//! The storage seam of the transformation core. Warehouse snapshots, the
//! watermark ledger and checkpoints are all written through this byte-oriented
//! key-value interface; the concrete persistence engine is pluggable.

use async_trait::async_trait;

use crate::error::StateResult;

/// Core trait for state backend implementations
///
/// Implementations must be safe for concurrent access from multiple tasks and
/// each individual operation must be atomic.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Retrieve a value for the given key
    ///
    /// Returns `Ok(None)` if the key does not exist.
    async fn get(&self, key: &[u8]) -> StateResult<Option<Vec<u8>>>;

    /// Store a value for the given key, overwriting any previous value
    async fn put(&self, key: &[u8], value: &[u8]) -> StateResult<()>;

    /// Delete a key; deleting a missing key is not an error
    async fn delete(&self, key: &[u8]) -> StateResult<()>;

    /// List all keys with the given prefix. An empty prefix matches all keys.
    async fn list_keys(&self, prefix: &[u8]) -> StateResult<Vec<Vec<u8>>>;

    /// Clear all state from the backend
    async fn clear(&self) -> StateResult<()> {
        let keys = self.list_keys(b"").await?;
        for key in keys {
            self.delete(&key).await?;
        }
        Ok(())
    }

    /// Get the number of keys in the backend
    async fn count(&self) -> StateResult<usize> {
        Ok(self.list_keys(b"").await?.len())
    }

    /// Check if a key exists
    async fn contains(&self, key: &[u8]) -> StateResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
