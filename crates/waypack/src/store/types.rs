//! # Store Types
//!
//! Common types used across the content store.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two durable cache namespaces.
///
/// Keeping them apart is a correctness requirement: an app-shell purge
/// during a version upgrade must never touch explicitly downloaded
/// content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheNamespace {
    /// Build-versioned application shell assets, replaced wholesale on
    /// upgrades.
    AppShell,
    /// Downloaded content units. Written only by explicit download
    /// operations, removed only by explicit remove operations.
    Content,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 2] = [CacheNamespace::AppShell, CacheNamespace::Content];

    /// Stable on-disk directory name for this namespace.
    pub fn dir_name(&self) -> &'static str {
        match self {
            CacheNamespace::AppShell => "app-shell",
            CacheNamespace::Content => "content",
        }
    }
}

/// Key identifying one cached entry: a canonical request path inside a
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub namespace: CacheNamespace,
    pub path: String,
}

impl EntryKey {
    pub fn new(namespace: CacheNamespace, path: impl Into<String>) -> Self {
        Self {
            namespace,
            path: path.into(),
        }
    }

    /// Key in the app-shell namespace.
    pub fn shell(path: impl Into<String>) -> Self {
        Self::new(CacheNamespace::AppShell, path)
    }

    /// Key in the content namespace.
    pub fn content(path: impl Into<String>) -> Self {
        Self::new(CacheNamespace::Content, path)
    }

    /// Convert to a filename-safe string
    pub fn to_filename(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.namespace.dir_name());
        hasher.update(":");
        hasher.update(&self.path);

        let hash = hasher.finalize();
        format!("{hash:x}")
    }
}

/// Metadata sidecar for a cached entry.
///
/// `path` records the canonical request path so the durable store can
/// enumerate a namespace without reversing the hashed filenames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryMetadata {
    /// Canonical request path this entry serves
    pub path: String,
    /// When the entry was stored
    pub stored_at: DateTime<Utc>,
    /// Content type of the resource, if the origin sent one
    pub content_type: Option<String>,
    /// Build revision of an app-shell asset, if known
    pub revision: Option<String>,
    /// Size of the stored body in bytes
    pub size: u64,
}

impl EntryMetadata {
    /// Create new metadata for a resource
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            stored_at: Utc::now(),
            content_type: None,
            revision: None,
            size,
        }
    }

    /// Set the content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the content type as an Option
    pub fn with_content_type_option(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Set the build revision
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Set the build revision as an Option
    pub fn with_revision_option(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }
}

/// A cached entry as returned by lookups.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub data: Bytes,
    pub metadata: EntryMetadata,
}

/// Result of a store operation
pub type StoreResult<T> = std::result::Result<T, std::io::Error>;

/// Result of a store lookup
pub type StoreLookupResult = StoreResult<Option<StoredEntry>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_stable_and_namespace_scoped() {
        let a = EntryKey::content("/data/city-packs/tokyo.json");
        let b = EntryKey::content("/data/city-packs/tokyo.json");
        let c = EntryKey::shell("/data/city-packs/tokyo.json");

        assert_eq!(a.to_filename(), b.to_filename());
        // Same path in the other namespace must not collide.
        assert_ne!(a.to_filename(), c.to_filename());
        assert_eq!(a.to_filename().len(), 64);
    }

    #[test]
    fn metadata_builder_chains() {
        let meta = EntryMetadata::new("/index.html", 42)
            .with_content_type("text/html")
            .with_revision("abc123");
        assert_eq!(meta.path, "/index.html");
        assert_eq!(meta.content_type.as_deref(), Some("text/html"));
        assert_eq!(meta.revision.as_deref(), Some("abc123"));
        assert_eq!(meta.size, 42);
    }
}
