//! # Store Provider
//!
//! Trait implemented by every storage tier of the content store.

use async_trait::async_trait;
use bytes::Bytes;

use crate::store::types::{CacheNamespace, EntryKey, EntryMetadata, StoreLookupResult, StoreResult};

/// A trait for storage tiers that can hold cached entries
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// Check if the store contains an entry for the given key
    async fn contains(&self, key: &EntryKey) -> StoreResult<bool>;

    /// Get an entry from the store
    async fn get(&self, key: &EntryKey) -> StoreLookupResult;

    /// Put an entry into the store
    async fn put(&self, key: EntryKey, data: Bytes, metadata: EntryMetadata) -> StoreResult<()>;

    /// Remove an entry from the store
    async fn remove(&self, key: &EntryKey) -> StoreResult<()>;

    /// Drop every entry of one namespace
    async fn clear(&self, namespace: CacheNamespace) -> StoreResult<()>;
}
