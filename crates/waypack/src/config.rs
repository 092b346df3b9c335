use std::path::PathBuf;
use std::time::Duration;

use crate::types::DEFAULT_CATALOG;

const DEFAULT_USER_AGENT: &str = concat!("waypack/", env!("CARGO_PKG_VERSION"));

/// Policy for answering "is this pack downloaded".
///
/// The ledger can drift from actual cache contents under storage
/// pressure, so callers that care can pay for a physical probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyPolicy {
    /// Ledger presence alone decides the status.
    #[default]
    TrustLedger,
    /// A ledger entry additionally requires the cached resource to exist.
    VerifyCache,
}

/// Configurable options for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upstream origin serving `/data/<catalog>/` resources
    pub origin: String,

    /// Root directory for the content store and the download ledger
    pub data_dir: PathBuf,

    /// Catalog name under `/data/`
    pub catalog: String,

    /// Overall timeout for one HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Size of the in-memory read-through cache tier, in bytes. Zero
    /// disables the tier.
    pub max_memory_cache_size: u64,

    /// How `status` treats ledger entries whose cache entry may be gone
    pub consistency: ConsistencyPolicy,

    /// Whether a download also prefetches the pack's hero asset
    pub prefetch_hero_asset: bool,

    /// Buffer size of the foreground-to-worker command channel
    pub worker_channel_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:4173".to_string(),
            data_dir: std::env::temp_dir().join("waypack"),
            catalog: DEFAULT_CATALOG.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_memory_cache_size: 16 * 1024 * 1024,
            consistency: ConsistencyPolicy::default(),
            prefetch_hero_asset: true,
            worker_channel_size: 32,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Directory holding the file-backed content store.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Path of the download ledger document.
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(crate::ledger::LEDGER_FILE)
    }
}

/// Builder for [`EngineConfig`]
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.origin = origin.into();
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = data_dir.into();
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.config.catalog = catalog.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = connect_timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn with_max_memory_cache_size(mut self, bytes: u64) -> Self {
        self.config.max_memory_cache_size = bytes;
        self
    }

    pub fn with_consistency(mut self, policy: ConsistencyPolicy) -> Self {
        self.config.consistency = policy;
        self
    }

    pub fn with_prefetch_hero_asset(mut self, enabled: bool) -> Self {
        self.config.prefetch_hero_asset = enabled;
        self
    }

    pub fn with_worker_channel_size(mut self, size: usize) -> Self {
        self.config.worker_channel_size = size;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = EngineConfig::builder()
            .with_origin("https://packs.example.net")
            .with_catalog("islands")
            .with_timeout(Duration::from_secs(5))
            .with_consistency(ConsistencyPolicy::VerifyCache)
            .with_prefetch_hero_asset(false)
            .build();

        assert_eq!(config.origin, "https://packs.example.net");
        assert_eq!(config.catalog, "islands");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.consistency, ConsistencyPolicy::VerifyCache);
        assert!(!config.prefetch_hero_asset);
        // Untouched fields keep their defaults.
        assert_eq!(config.worker_channel_size, 32);
    }

    #[test]
    fn derived_paths_live_under_data_dir() {
        let config = EngineConfig::builder().with_data_dir("/tmp/wp-test").build();
        assert_eq!(config.store_dir(), PathBuf::from("/tmp/wp-test/store"));
        assert!(config.ledger_path().starts_with("/tmp/wp-test"));
    }
}
