//! # File Store
//!
//! Durable, file-backed storage tier. Bodies live under one
//! subdirectory per namespace, addressed by hashed key, with a JSON
//! metadata sidecar next to each body. Writes go through a temp file
//! and a rename so readers never observe a half-written entry.

use std::path::PathBuf;

use bytes::Bytes;
use tokio::fs;
use tokio::io;
use tracing::{debug, warn};

use crate::store::types::{
    CacheNamespace, EntryKey, EntryMetadata, StoreLookupResult, StoreResult, StoredEntry,
};

use super::provider::StoreProvider;

#[derive(Debug, Clone)]
pub struct FileStore {
    root_dir: PathBuf,
    initialized: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl FileStore {
    /// Create a new file store rooted at the specified directory
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            initialized: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Initialize the store directories
    pub(crate) async fn ensure_initialized(&self) -> io::Result<()> {
        use std::sync::atomic::Ordering;

        // Fast path - already initialized
        if self.initialized.load(Ordering::Relaxed) {
            return Ok(());
        }

        // Use compare_exchange to ensure only one task initializes
        if self
            .initialized
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            fs::create_dir_all(&self.root_dir).await?;
            for namespace in &CacheNamespace::ALL {
                fs::create_dir_all(self.root_dir.join(namespace.dir_name())).await?;
            }
            self.initialized.store(true, Ordering::Release);
        } else {
            // Another task is initializing, wait for it to complete
            while !self.initialized.load(Ordering::Acquire) {
                tokio::task::yield_now().await;
            }
        }

        Ok(())
    }

    fn entry_path(&self, key: &EntryKey) -> PathBuf {
        self.root_dir
            .join(key.namespace.dir_name())
            .join(key.to_filename())
    }

    fn metadata_path(&self, key: &EntryKey) -> PathBuf {
        let mut path = self.entry_path(key);
        path.set_extension("meta");
        path
    }

    /// Canonical request paths of every entry in `namespace`, read from
    /// the metadata sidecars. Unreadable sidecars are skipped.
    pub async fn keys(&self, namespace: CacheNamespace) -> StoreResult<Vec<String>> {
        self.ensure_initialized().await?;

        let dir = self.root_dir.join(namespace.dir_name());
        let mut entries = fs::read_dir(&dir).await?;
        let mut paths = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let file_path = entry.path();
            if file_path.extension().and_then(|e| e.to_str()) != Some("meta") {
                continue;
            }
            let bytes = match fs::read(&file_path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = ?file_path, error = %e, "Failed to read metadata sidecar");
                    continue;
                }
            };
            match serde_json::from_slice::<EntryMetadata>(&bytes) {
                Ok(metadata) => paths.push(metadata.path),
                Err(e) => {
                    warn!(path = ?file_path, error = %e, "Skipping unparsable metadata sidecar");
                }
            }
        }

        Ok(paths)
    }
}

#[async_trait::async_trait]
impl StoreProvider for FileStore {
    async fn contains(&self, key: &EntryKey) -> StoreResult<bool> {
        self.ensure_initialized().await?;

        let data_path = self.entry_path(key);
        let meta_path = self.metadata_path(key);

        let data_exists = fs::try_exists(&data_path).await?;
        let meta_exists = fs::try_exists(&meta_path).await?;

        Ok(data_exists && meta_exists)
    }

    async fn get(&self, key: &EntryKey) -> StoreLookupResult {
        self.ensure_initialized().await?;

        let data_path = self.entry_path(key);
        let meta_path = self.metadata_path(key);

        let data_exists = fs::try_exists(&data_path).await?;
        let meta_exists = fs::try_exists(&meta_path).await?;

        if !data_exists || !meta_exists {
            return Ok(None);
        }

        let metadata_bytes = match fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Failed to read metadata sidecar");
                return Ok(None);
            }
        };

        let metadata: EntryMetadata = match serde_json::from_slice(&metadata_bytes) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Failed to parse metadata sidecar");

                // Drop the invalid entry in the background rather than
                // blocking this lookup.
                let data_path_clone = data_path.clone();
                let meta_path_clone = meta_path.clone();
                tokio::spawn(async move {
                    let _ = fs::remove_file(&data_path_clone).await;
                    let _ = fs::remove_file(&meta_path_clone).await;
                });

                return Ok(None);
            }
        };

        let data = match fs::read(&data_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = ?data_path, error = %e, "Failed to read entry body");
                return Ok(None);
            }
        };

        Ok(Some(StoredEntry {
            data: Bytes::from(data),
            metadata,
        }))
    }

    async fn put(&self, key: EntryKey, data: Bytes, metadata: EntryMetadata) -> StoreResult<()> {
        self.ensure_initialized().await?;

        let data_path = self.entry_path(&key);
        let meta_path = self.metadata_path(&key);

        let metadata_json = match serde_json::to_vec(&metadata) {
            Ok(json) => json,
            Err(e) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Failed to serialize metadata: {e}"),
                ));
            }
        };

        // Write to temporary files first, then rename, so a crash mid-write
        // never leaves a truncated entry behind.
        let temp_data_path = data_path.with_extension("tmp");
        let temp_meta_path = meta_path.with_extension("mtmp");

        if let Err(e) = fs::write(&temp_data_path, &data).await {
            warn!(path = ?temp_data_path, error = %e, "Failed to write entry body");
            return Err(e);
        }

        if let Err(e) = fs::write(&temp_meta_path, &metadata_json).await {
            warn!(path = ?temp_meta_path, error = %e, "Failed to write metadata sidecar");
            let _ = fs::remove_file(&temp_data_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_data_path, &data_path).await {
            warn!(
                from = ?temp_data_path,
                to = ?data_path,
                error = %e,
                "Failed to rename temporary body file"
            );
            let _ = fs::remove_file(&temp_data_path).await;
            let _ = fs::remove_file(&temp_meta_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_meta_path, &meta_path).await {
            warn!(
                from = ?temp_meta_path,
                to = ?meta_path,
                error = %e,
                "Failed to rename temporary metadata file"
            );
            // The body was renamed but the metadata was not; remove both
            // to avoid an inconsistent entry.
            let _ = fs::remove_file(&data_path).await;
            let _ = fs::remove_file(&temp_meta_path).await;
            return Err(e);
        }

        debug!(key = ?key, "Stored entry to file");
        Ok(())
    }

    async fn remove(&self, key: &EntryKey) -> StoreResult<()> {
        self.ensure_initialized().await?;

        let data_path = self.entry_path(key);
        let meta_path = self.metadata_path(key);

        // Missing files are fine; remove is idempotent.
        let data_result = fs::remove_file(&data_path).await;
        let meta_result = fs::remove_file(&meta_path).await;

        match (data_result, meta_result) {
            (Err(e), _) if e.kind() != io::ErrorKind::NotFound => {
                warn!(path = ?data_path, error = %e, "Failed to remove entry body");
                Err(e)
            }
            (_, Err(e)) if e.kind() != io::ErrorKind::NotFound => {
                warn!(path = ?meta_path, error = %e, "Failed to remove metadata sidecar");
                Err(e)
            }
            _ => Ok(()),
        }
    }

    async fn clear(&self, namespace: CacheNamespace) -> StoreResult<()> {
        self.ensure_initialized().await?;

        let dir = self.root_dir.join(namespace.dir_name());
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(dir = ?dir, error = %e, "Failed to clear namespace directory");
                return Err(e);
            }
        }
        fs::create_dir_all(&dir).await?;

        debug!(namespace = ?namespace, "Cleared namespace");
        Ok(())
    }
}
