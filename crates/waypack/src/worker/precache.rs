//! Precache manifest for the app shell.
//!
//! The manifest is produced by the frontend build and lists every shell
//! asset with an optional content revision. Install stores exactly this
//! list; activate purges everything the current manifest no longer
//! names.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Path of the shell document every navigation falls back to.
pub const SHELL_DOCUMENT: &str = "/index.html";

/// One shell asset to precache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrecacheAsset {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl PrecacheAsset {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

/// The shell asset list for one build of the application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrecacheManifest {
    pub version: String,
    pub assets: Vec<PrecacheAsset>,
}

impl Default for PrecacheManifest {
    fn default() -> Self {
        Self {
            version: "dev".to_string(),
            assets: vec![PrecacheAsset::new(SHELL_DOCUMENT)],
        }
    }
}

impl PrecacheManifest {
    pub fn new(version: impl Into<String>, assets: Vec<PrecacheAsset>) -> Self {
        Self {
            version: version.into(),
            assets,
        }
    }

    /// Parse a manifest document produced by the frontend build.
    pub fn from_json(bytes: &[u8]) -> EngineResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| EngineError::InvalidResource(format!("invalid precache manifest: {e}")))
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.assets.iter().any(|asset| asset.url == path)
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_build_manifest() {
        let json = r#"{
            "version": "2024.06.01",
            "assets": [
                { "url": "/index.html", "revision": "abc123" },
                { "url": "/assets/app.js" }
            ]
        }"#;

        let manifest = PrecacheManifest::from_json(json.as_bytes()).unwrap();
        assert_eq!(manifest.version, "2024.06.01");
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.assets[0].revision.as_deref(), Some("abc123"));
        assert!(manifest.assets[1].revision.is_none());
    }

    #[test]
    fn rejects_malformed_documents() {
        let result = PrecacheManifest::from_json(b"[1, 2, 3]");
        assert!(matches!(result, Err(EngineError::InvalidResource(_))));
    }

    #[test]
    fn default_manifest_covers_the_shell_document() {
        let manifest = PrecacheManifest::default();
        assert!(manifest.contains_path(SHELL_DOCUMENT));
        assert!(!manifest.contains_path("/assets/app.js"));
    }
}
