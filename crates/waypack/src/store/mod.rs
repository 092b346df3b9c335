//! # Content Store
//!
//! The durable key-value cache shared by the foreground download
//! manager and the background worker. Entries are addressed by
//! canonical request path inside one of two namespaces; the file tier
//! is authoritative and an optional in-memory tier serves repeat reads.

pub mod providers;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io;

pub use providers::{FileStore, MemoryStore, StoreProvider};
pub use types::{
    CacheNamespace, EntryKey, EntryMetadata, StoreLookupResult, StoreResult, StoredEntry,
};

/// Configuration for the content store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory of the file tier
    pub root_dir: PathBuf,
    /// Maximum size of the memory tier in bytes; zero disables it
    pub max_memory_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: std::env::temp_dir().join("waypack-store"),
            max_memory_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Store coordinating the memory and file tiers
#[derive(Clone)]
pub struct ContentStore {
    memory: Option<Arc<MemoryStore>>,
    file: Arc<FileStore>,
}

impl ContentStore {
    /// Create a store, initializing the backing directories up front.
    pub async fn new(config: StoreConfig) -> io::Result<Self> {
        let file = Arc::new(FileStore::new(config.root_dir));
        file.ensure_initialized().await?;

        let memory = if config.max_memory_bytes > 0 {
            Some(Arc::new(MemoryStore::new(config.max_memory_bytes)))
        } else {
            None
        };

        Ok(Self { memory, file })
    }

    /// Get an entry, promoting file hits into the memory tier.
    pub async fn get(&self, key: &EntryKey) -> StoreLookupResult {
        if let Some(memory) = &self.memory {
            if let Some(entry) = memory.get(key).await? {
                return Ok(Some(entry));
            }
        }

        if let Some(entry) = self.file.get(key).await? {
            if let Some(memory) = &self.memory {
                let _ = memory
                    .put(key.clone(), entry.data.clone(), entry.metadata.clone())
                    .await;
            }
            return Ok(Some(entry));
        }

        Ok(None)
    }

    /// Put an entry into both tiers.
    pub async fn put(
        &self,
        key: EntryKey,
        data: Bytes,
        metadata: EntryMetadata,
    ) -> StoreResult<()> {
        if let Some(memory) = &self.memory {
            let _ = memory
                .put(key.clone(), data.clone(), metadata.clone())
                .await;
        }
        self.file.put(key, data, metadata).await
    }

    /// Check whether an entry exists in either tier.
    pub async fn contains(&self, key: &EntryKey) -> StoreResult<bool> {
        if let Some(memory) = &self.memory {
            if memory.contains(key).await? {
                return Ok(true);
            }
        }
        self.file.contains(key).await
    }

    /// Remove an entry from both tiers. The file tier error wins.
    pub async fn remove(&self, key: &EntryKey) -> StoreResult<()> {
        let mem_result = match &self.memory {
            Some(memory) => memory.remove(key).await,
            None => Ok(()),
        };
        let file_result = self.file.remove(key).await;
        file_result.or(mem_result)
    }

    /// Canonical request paths of every durable entry in `namespace`.
    pub async fn keys(&self, namespace: CacheNamespace) -> StoreResult<Vec<String>> {
        self.file.keys(namespace).await
    }

    /// Drop every entry of `namespace` from both tiers.
    pub async fn clear(&self, namespace: CacheNamespace) -> StoreResult<()> {
        let mem_result = match &self.memory {
            Some(memory) => memory.clear(namespace).await,
            None => Ok(()),
        };
        let file_result = self.file.clear(namespace).await;
        file_result.or(mem_result)
    }
}
