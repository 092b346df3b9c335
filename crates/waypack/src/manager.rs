//! # Download Manager
//!
//! Foreground orchestrator for offline availability. The manager is the
//! authoritative writer: a download fetches the pack fresh, stores it in
//! the content namespace, records it in the ledger, and only then
//! notifies the worker so the same operation is applied redundantly.
//! Message delivery order never affects correctness because both writers
//! replace the same key in full.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::client::FetchClient;
use crate::config::{ConsistencyPolicy, EngineConfig};
use crate::error::EngineResult;
use crate::ledger::{DownloadLedger, DownloadRecord};
use crate::store::{ContentStore, EntryKey, EntryMetadata, StoreConfig};
use crate::types::{CityPack, DownloadStatus, pack_data_path};
use crate::worker::{WorkerCommand, WorkerHandle};

/// Foreground download orchestrator.
pub struct DownloadManager {
    config: EngineConfig,
    store: ContentStore,
    ledger: DownloadLedger,
    client: FetchClient,
    worker: Option<WorkerHandle>,
    transient: RwLock<HashMap<String, DownloadStatus>>,
}

impl DownloadManager {
    /// Build a manager owning its own store, ledger, and client, all
    /// derived from the configuration.
    pub async fn new(config: EngineConfig) -> EngineResult<Self> {
        let store = ContentStore::new(StoreConfig {
            root_dir: config.store_dir(),
            max_memory_bytes: config.max_memory_cache_size,
        })
        .await?;
        let client = FetchClient::new(&config)?;
        let ledger = DownloadLedger::open(config.ledger_path())?;
        Ok(Self::from_parts(config, store, client, ledger))
    }

    /// Build a manager over already-constructed subsystems. Used when
    /// the store and client are shared with a worker runtime.
    pub fn from_parts(
        config: EngineConfig,
        store: ContentStore,
        client: FetchClient,
        ledger: DownloadLedger,
    ) -> Self {
        Self {
            config,
            store,
            ledger,
            client,
            worker: None,
            transient: RwLock::new(HashMap::new()),
        }
    }

    /// Attach a spawned worker for redundant writes. Without one the
    /// manager stays fully functional; the worker is never required for
    /// correctness.
    pub fn attach_worker(&mut self, handle: WorkerHandle) {
        self.worker = Some(handle);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Current status of `id`. Pure: a transient overlay wins, otherwise
    /// the ledger decides.
    pub fn status(&self, id: &str) -> DownloadStatus {
        if let Some(status) = self.transient.read().get(id) {
            return *status;
        }
        if self.ledger.contains(id) {
            DownloadStatus::Downloaded
        } else {
            DownloadStatus::NotDownloaded
        }
    }

    /// Status with the configured consistency policy applied. Under
    /// `VerifyCache` a ledger entry whose cached resource has gone
    /// missing reports `not-downloaded` instead of lying.
    pub async fn verified_status(&self, id: &str) -> EngineResult<DownloadStatus> {
        let status = self.status(id);
        if self.config.consistency == ConsistencyPolicy::TrustLedger
            || status != DownloadStatus::Downloaded
        {
            return Ok(status);
        }

        let key = EntryKey::content(pack_data_path(&self.config.catalog, id));
        if self.store.contains(&key).await? {
            Ok(DownloadStatus::Downloaded)
        } else {
            warn!(id = %id, "Ledger entry present but cache entry missing");
            Ok(DownloadStatus::NotDownloaded)
        }
    }

    /// Make `id` available offline.
    ///
    /// Order matters: content write before ledger insert, so the ledger
    /// never claims a pack whose bytes were not stored. Any failure
    /// surfaces as transient `error` and leaves the ledger untouched.
    pub async fn download(&self, id: &str) -> EngineResult<()> {
        self.set_transient(id, DownloadStatus::Downloading);

        match self.perform_download(id).await {
            Ok(()) => {
                // The ledger now answers `downloaded` on its own; keeping
                // an overlay entry around would only pin stale state.
                self.clear_transient(id);
                Ok(())
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Download failed");
                self.set_transient(id, DownloadStatus::Error);
                Err(e)
            }
        }
    }

    async fn perform_download(&self, id: &str) -> EngineResult<()> {
        let data_path = pack_data_path(&self.config.catalog, id);
        let resource = self.client.get_fresh(&data_path).await?;

        let hero_asset = self.hero_asset(id, &resource.body);

        let metadata = EntryMetadata::new(data_path.clone(), resource.body.len() as u64)
            .with_content_type_option(resource.content_type.clone());
        self.store
            .put(EntryKey::content(&data_path), resource.body, metadata)
            .await?;

        if let Some(hero) = &hero_asset {
            self.prefetch_hero(id, hero).await;
        }

        self.ledger.insert(DownloadRecord::now(id))?;
        info!(id = %id, "Pack downloaded");

        self.notify_worker(WorkerCommand::Download {
            id: id.to_string(),
            assets: hero_asset.map(|url| vec![url]),
        });
        Ok(())
    }

    /// Hero asset URL of the fetched pack, when prefetching is enabled.
    /// A pack body that does not parse is still stored verbatim; it only
    /// costs us the prefetch.
    fn hero_asset(&self, id: &str, body: &[u8]) -> Option<String> {
        if !self.config.prefetch_hero_asset {
            return None;
        }
        match serde_json::from_slice::<CityPack>(body) {
            Ok(pack) => pack.hero_image,
            Err(e) => {
                debug!(id = %id, error = %e, "Pack body unparsable, skipping hero prefetch");
                None
            }
        }
    }

    /// Prefetch failures are logged and never fail the download.
    async fn prefetch_hero(&self, id: &str, url: &str) {
        match self.client.get(url).await {
            Ok(resource) => {
                let metadata = EntryMetadata::new(url.to_string(), resource.body.len() as u64)
                    .with_content_type_option(resource.content_type.clone());
                if let Err(e) = self
                    .store
                    .put(EntryKey::content(url), resource.body, metadata)
                    .await
                {
                    warn!(id = %id, url = %url, error = %e, "Failed to store hero asset");
                } else {
                    debug!(id = %id, url = %url, "Prefetched hero asset");
                }
            }
            Err(e) => {
                warn!(id = %id, url = %url, error = %e, "Hero asset prefetch failed");
            }
        }
    }

    /// Drop `id` from offline availability. Idempotent: removing a pack
    /// that was never downloaded leaves everything as it was.
    pub async fn remove(&self, id: &str) -> EngineResult<()> {
        let data_path = pack_data_path(&self.config.catalog, id);
        let key = EntryKey::content(&data_path);

        // The prefetched hero asset goes with the pack. Read it out of
        // the cached body before that body disappears.
        let hero_asset = match self.store.get(&key).await {
            Ok(Some(entry)) => serde_json::from_slice::<CityPack>(&entry.data)
                .ok()
                .and_then(|pack| pack.hero_image),
            _ => None,
        };

        self.store.remove(&key).await?;
        if let Some(hero) = hero_asset {
            self.store.remove(&EntryKey::content(&hero)).await?;
        }

        let removed = self.ledger.remove(id)?;
        if removed {
            info!(id = %id, "Pack removed");
        }

        self.clear_transient(id);
        self.notify_worker(WorkerCommand::Remove { id: id.to_string() });
        Ok(())
    }

    /// Downloaded packs, most recent first.
    pub fn list_downloaded(&self) -> Vec<DownloadRecord> {
        self.ledger.records()
    }

    /// Forget the transient overlay for `id`, typically after the UI has
    /// consumed an error state.
    pub fn clear_transient(&self, id: &str) {
        self.transient.write().remove(id);
    }

    fn set_transient(&self, id: &str, status: DownloadStatus) {
        self.transient.write().insert(id.to_string(), status);
    }

    fn notify_worker(&self, command: WorkerCommand) {
        if let Some(worker) = &self.worker {
            worker.notify(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::types::pack_data_path;
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CATALOG: &str = "city-packs";

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("waypack_engine=debug")
            .with_test_writer()
            .try_init();
    }

    fn config_for(origin: &str, data_dir: &std::path::Path) -> EngineConfig {
        EngineConfig::builder()
            .with_origin(origin)
            .with_data_dir(data_dir)
            .with_timeout(Duration::from_millis(500))
            .with_connect_timeout(Duration::from_millis(500))
            .build()
    }

    async fn manager_for(origin: &str, data_dir: &std::path::Path) -> DownloadManager {
        DownloadManager::new(config_for(origin, data_dir))
            .await
            .unwrap()
    }

    async fn mount_pack(server: &MockServer, slug: &str, body: &str) {
        Mock::given(method("GET"))
            .and(url_path(pack_data_path(CATALOG, slug)))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(body.to_string()),
            )
            .mount(server)
            .await;
    }

    fn pack_body(slug: &str) -> String {
        format!(
            r#"{{"slug":"{slug}","city":"Paris","country":"France","region":"Europe","version":1,"updatedAt":"2025-10-01T00:00:00Z"}}"#
        )
    }

    #[tokio::test]
    async fn download_then_status_yields_downloaded() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mount_pack(&server, "paris", &pack_body("paris")).await;

        let manager = manager_for(&server.uri(), dir.path()).await;
        assert_eq!(manager.status("paris"), DownloadStatus::NotDownloaded);

        manager.download("paris").await.unwrap();
        assert_eq!(manager.status("paris"), DownloadStatus::Downloaded);
        assert_eq!(manager.list_downloaded().len(), 1);
    }

    #[tokio::test]
    async fn downloaded_status_survives_a_fresh_session_offline() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mount_pack(&server, "paris", &pack_body("paris")).await;

        let manager = manager_for(&server.uri(), dir.path()).await;
        manager.download("paris").await.unwrap();
        drop(manager);
        drop(server);

        // Fresh process, same durable storage, no reachable network.
        let reloaded = manager_for("http://127.0.0.1:9", dir.path()).await;
        assert_eq!(reloaded.status("paris"), DownloadStatus::Downloaded);
        let key = EntryKey::content(pack_data_path(CATALOG, "paris"));
        assert!(reloaded.store().contains(&key).await.unwrap());
    }

    #[tokio::test]
    async fn failed_download_sets_error_and_leaves_ledger_untouched() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let manager = manager_for(&server.uri(), dir.path()).await;
        let result = manager.download("atlantis").await;

        assert!(matches!(result, Err(EngineError::Status { .. })));
        assert_eq!(manager.status("atlantis"), DownloadStatus::Error);
        assert!(manager.list_downloaded().is_empty());
        let key = EntryKey::content(pack_data_path(CATALOG, "atlantis"));
        assert!(!manager.store().contains(&key).await.unwrap());
    }

    #[tokio::test]
    async fn transient_error_wins_over_ledger_derived_downloaded() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mount_pack(&server, "paris", &pack_body("paris")).await;

        let manager = manager_for(&server.uri(), dir.path()).await;
        manager.download("paris").await.unwrap();

        // A later failed refresh overlays the ledger-derived value.
        server.reset().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let _ = manager.download("paris").await;

        assert_eq!(manager.status("paris"), DownloadStatus::Error);
        manager.clear_transient("paris");
        assert_eq!(manager.status("paris"), DownloadStatus::Downloaded);
    }

    #[tokio::test]
    async fn remove_of_never_downloaded_pack_is_a_noop() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;

        let manager = manager_for(&server.uri(), dir.path()).await;
        manager.remove("never-downloaded").await.unwrap();
        assert_eq!(
            manager.status("never-downloaded"),
            DownloadStatus::NotDownloaded
        );
        assert!(manager.list_downloaded().is_empty());
    }

    #[tokio::test]
    async fn remove_drops_cache_entry_and_ledger_record() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mount_pack(&server, "paris", &pack_body("paris")).await;

        let manager = manager_for(&server.uri(), dir.path()).await;
        manager.download("paris").await.unwrap();
        manager.remove("paris").await.unwrap();

        assert_eq!(manager.status("paris"), DownloadStatus::NotDownloaded);
        assert!(manager.list_downloaded().is_empty());
        let key = EntryKey::content(pack_data_path(CATALOG, "paris"));
        assert!(!manager.store().contains(&key).await.unwrap());
    }

    #[tokio::test]
    async fn completed_operations_leave_no_transient_entries() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mount_pack(&server, "paris", &pack_body("paris")).await;

        let manager = manager_for(&server.uri(), dir.path()).await;

        manager.download("paris").await.unwrap();
        assert_eq!(manager.status("paris"), DownloadStatus::Downloaded);
        assert!(manager.transient.read().is_empty());

        manager.remove("paris").await.unwrap();
        assert_eq!(manager.status("paris"), DownloadStatus::NotDownloaded);
        assert!(manager.transient.read().is_empty());

        // Only a failure leaves an overlay behind, until it is consumed.
        let _ = manager.download("everest").await;
        assert_eq!(manager.transient.read().len(), 1);
        assert_eq!(manager.status("everest"), DownloadStatus::Error);
        manager.clear_transient("everest");
        assert!(manager.transient.read().is_empty());
    }

    #[tokio::test]
    async fn overlapping_downloads_leave_one_ledger_entry() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mount_pack(&server, "paris", &pack_body("paris")).await;

        let manager = manager_for(&server.uri(), dir.path()).await;
        let (a, b) = tokio::join!(manager.download("paris"), manager.download("paris"));
        a.unwrap();
        b.unwrap();

        assert_eq!(manager.list_downloaded().len(), 1);
        assert_eq!(manager.status("paris"), DownloadStatus::Downloaded);
    }

    #[tokio::test]
    async fn download_prefetches_the_hero_asset() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        let body = r#"{"slug":"paris","city":"Paris","country":"France","region":"Europe","version":1,"updatedAt":"2025-10-01T00:00:00Z","heroImage":"/images/paris-hero.jpg"}"#;
        mount_pack(&server, "paris", body).await;
        Mock::given(method("GET"))
            .and(url_path("/images/paris-hero.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_string("jpg"))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server.uri(), dir.path()).await;
        manager.download("paris").await.unwrap();

        assert!(manager
            .store()
            .contains(&EntryKey::content("/images/paris-hero.jpg"))
            .await
            .unwrap());

        // Remove takes the hero asset with it.
        manager.remove("paris").await.unwrap();
        assert!(!manager
            .store()
            .contains(&EntryKey::content("/images/paris-hero.jpg"))
            .await
            .unwrap());
        server.verify().await;
    }

    #[tokio::test]
    async fn hero_prefetch_failure_does_not_fail_the_download() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        let body = r#"{"slug":"paris","city":"Paris","country":"France","region":"Europe","version":1,"updatedAt":"2025-10-01T00:00:00Z","heroImage":"/images/missing.jpg"}"#;
        mount_pack(&server, "paris", body).await;
        // /images/missing.jpg is not mounted and returns 404.

        let manager = manager_for(&server.uri(), dir.path()).await;
        manager.download("paris").await.unwrap();
        assert_eq!(manager.status("paris"), DownloadStatus::Downloaded);
    }

    #[tokio::test]
    async fn verified_status_detects_a_drifted_ledger() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mount_pack(&server, "paris", &pack_body("paris")).await;

        let config = EngineConfig::builder()
            .with_origin(server.uri())
            .with_data_dir(dir.path())
            .with_consistency(ConsistencyPolicy::VerifyCache)
            .build();
        let manager = DownloadManager::new(config).await.unwrap();
        manager.download("paris").await.unwrap();
        manager.clear_transient("paris");
        assert_eq!(
            manager.verified_status("paris").await.unwrap(),
            DownloadStatus::Downloaded
        );

        // Evict the cached bytes behind the ledger's back.
        let key = EntryKey::content(pack_data_path(CATALOG, "paris"));
        manager.store().remove(&key).await.unwrap();
        assert_eq!(
            manager.verified_status("paris").await.unwrap(),
            DownloadStatus::NotDownloaded
        );
        // The pure status still trusts the ledger.
        assert_eq!(manager.status("paris"), DownloadStatus::Downloaded);
    }

    #[tokio::test]
    async fn download_notifies_an_attached_worker() {
        init_tracing();
        let dir = tempdir().unwrap();
        let server = MockServer::start().await;
        mount_pack(&server, "paris", &pack_body("paris")).await;

        let config = config_for(&server.uri(), dir.path());
        let store = ContentStore::new(StoreConfig {
            root_dir: config.store_dir(),
            max_memory_bytes: config.max_memory_cache_size,
        })
        .await
        .unwrap();
        let client = FetchClient::new(&config).unwrap();
        let ledger = DownloadLedger::open(config.ledger_path()).unwrap();

        let runtime = crate::worker::WorkerRuntime::new(
            store.clone(),
            client.clone(),
            CATALOG,
            crate::worker::PrecacheManifest::default(),
        );
        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let (handle, join) = runtime.spawn(8, shutdown_rx);

        let mut manager = DownloadManager::from_parts(config, store, client, ledger);
        manager.attach_worker(handle);
        manager.download("paris").await.unwrap();
        assert_eq!(manager.status("paris"), DownloadStatus::Downloaded);

        shutdown_tx.send(()).unwrap();
        join.await.unwrap();
    }
}
