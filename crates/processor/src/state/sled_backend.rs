//! Sled-based persistent state backend
//!
//! Keeps the warehouse across process restarts; the CLI uses it for
//! `--state-dir`.

use async_trait::async_trait;
use sled::Db;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::backend::StateBackend;
use crate::error::{StateError, StateResult};

/// Configuration for the Sled backend
#[derive(Debug, Clone)]
pub struct SledConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Cache size in bytes (default: 64MB)
    pub cache_capacity: u64,
    /// Flush to disk after every write (default: true)
    pub flush_on_write: bool,
}

impl SledConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache_capacity: 64 * 1024 * 1024,
            flush_on_write: true,
        }
    }

    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_flush_on_write(mut self, flush: bool) -> Self {
        self.flush_on_write = flush;
        self
    }
}

fn storage_error(details: String) -> StateError {
    StateError::StorageError {
        backend_type: "sled".to_string(),
        details,
    }
}

/// Sled-based persistent state backend
pub struct SledStateBackend {
    db: Arc<Db>,
    config: SledConfig,
}

impl SledStateBackend {
    /// Open (or create) a Sled database
    pub async fn open(config: SledConfig) -> StateResult<Self> {
        info!(path = ?config.path, "opening sled database");

        tokio::fs::create_dir_all(&config.path)
            .await
            .map_err(|e| storage_error(format!("Failed to create directory: {}", e)))?;

        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_capacity)
            .open()
            .map_err(|e| storage_error(format!("Failed to open database: {}", e)))?;

        info!(keys = db.len(), "sled database opened");

        Ok(Self {
            db: Arc::new(db),
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Flush all pending writes to disk, returning the bytes flushed
    pub async fn flush(&self) -> StateResult<usize> {
        let flushed = self
            .db
            .flush_async()
            .await
            .map_err(|e| storage_error(format!("Flush failed: {}", e)))?;
        debug!(bytes = flushed, "flushed sled database");
        Ok(flushed)
    }
}

#[async_trait]
impl StateBackend for SledStateBackend {
    async fn get(&self, key: &[u8]) -> StateResult<Option<Vec<u8>>> {
        let value = self
            .db
            .get(key)
            .map_err(|e| storage_error(format!("Get failed: {}", e)))?;
        Ok(value.map(|v| v.to_vec()))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StateResult<()> {
        self.db
            .insert(key, value)
            .map_err(|e| storage_error(format!("Insert failed: {}", e)))?;
        if self.config.flush_on_write {
            self.flush().await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> StateResult<()> {
        self.db
            .remove(key)
            .map_err(|e| storage_error(format!("Remove failed: {}", e)))?;
        if self.config.flush_on_write {
            self.flush().await?;
        }
        Ok(())
    }

    async fn list_keys(&self, prefix: &[u8]) -> StateResult<Vec<Vec<u8>>> {
        self.db
            .scan_prefix(prefix)
            .keys()
            .map(|key| {
                key.map(|k| k.to_vec())
                    .map_err(|e| storage_error(format!("Scan failed: {}", e)))
            })
            .collect()
    }

    async fn count(&self) -> StateResult<usize> {
        Ok(self.db.len())
    }
}
