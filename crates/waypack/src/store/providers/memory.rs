//! # Memory Store
//!
//! In-memory read-through tier in front of the file store, backed by
//! Moka. Holds whatever was recently served so repeated intercepts of
//! the same resource skip disk entirely.

use bytes::Bytes;
use moka::future::Cache as MokaCache;
use tracing::{debug, warn};

use crate::store::providers::provider::StoreProvider;
use crate::store::types::{
    CacheNamespace, EntryKey, EntryMetadata, StoreLookupResult, StoreResult, StoredEntry,
};

/// Memory store implementation using Moka
#[derive(Clone)]
pub struct MemoryStore {
    cache: MokaCache<EntryKey, StoredEntry>,
    /// Maximum size for this tier in bytes
    max_size: u64,
}

impl MemoryStore {
    /// Create a new memory store with the specified size limit
    pub fn new(max_size_bytes: u64) -> Self {
        if max_size_bytes == 0 {
            panic!("Memory store size must be greater than zero");
        }

        // Size based eviction, weighted by body length
        let cache = MokaCache::builder()
            .weigher(|_k, v: &StoredEntry| v.data.len().try_into().unwrap_or(u32::MAX))
            .max_capacity(max_size_bytes)
            .build();

        debug!(max_size = max_size_bytes, "Memory store created");

        Self {
            cache,
            max_size: max_size_bytes,
        }
    }
}

#[async_trait::async_trait]
impl StoreProvider for MemoryStore {
    async fn contains(&self, key: &EntryKey) -> StoreResult<bool> {
        Ok(self.cache.contains_key(key))
    }

    async fn get(&self, key: &EntryKey) -> StoreLookupResult {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, key: EntryKey, data: Bytes, metadata: EntryMetadata) -> StoreResult<()> {
        // A single entry larger than the whole tier would evict everything
        // else for no benefit; leave it to the file store.
        if data.len() as u64 > self.max_size {
            warn!(
                key = ?key,
                size = data.len(),
                max_size = self.max_size,
                "Entry too large for memory tier, skipping"
            );
            return Ok(());
        }

        self.cache.insert(key, StoredEntry { data, metadata }).await;
        Ok(())
    }

    async fn remove(&self, key: &EntryKey) -> StoreResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self, _namespace: CacheNamespace) -> StoreResult<()> {
        // The tier holds both namespaces; dropping everything is harmless
        // because the file store remains authoritative.
        self.cache.invalidate_all();
        debug!("Memory tier cleared");
        Ok(())
    }
}
