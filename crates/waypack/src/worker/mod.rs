//! # Content Worker
//!
//! Background task owning the app-shell lifecycle and executing
//! download/remove commands redundantly to the foreground manager.
//! Install precaches the shell asset list, activate purges shell
//! entries the current build no longer ships, and the run loop
//! processes commands until shutdown.
//!
//! The worker never has exclusive state: everything it writes goes
//! through the shared [`ContentStore`], and every command is idempotent
//! so the foreground and the worker can both perform it in any order.

pub mod command;
pub mod fetch;
pub mod precache;

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use command::{WorkerCommand, WorkerMessage};
pub use fetch::{
    FetchIntercept, InterceptRequest, InterceptResponse, RequestMode, ServeSource,
};
pub use precache::{PrecacheAsset, PrecacheManifest, SHELL_DOCUMENT};

use crate::client::FetchClient;
use crate::error::{EngineError, EngineResult};
use crate::store::{CacheNamespace, ContentStore, EntryKey, EntryMetadata};
use crate::types::pack_data_path;

/// Upper bound on asset prefetches honored per download command.
pub const MAX_COMMAND_ASSETS: usize = 8;

/// Lifecycle of the worker, mirrored from install through activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Activated => write!(f, "activated"),
        }
    }
}

/// The worker runtime. Construct it, run [`install`](Self::install) and
/// [`activate`](Self::activate), then [`spawn`](Self::spawn) it to get
/// a [`WorkerHandle`] for issuing commands.
pub struct WorkerRuntime {
    store: ContentStore,
    client: FetchClient,
    catalog: String,
    manifest: PrecacheManifest,
    state: Arc<RwLock<WorkerState>>,
}

impl WorkerRuntime {
    pub fn new(
        store: ContentStore,
        client: FetchClient,
        catalog: impl Into<String>,
        manifest: PrecacheManifest,
    ) -> Self {
        Self {
            store,
            client,
            catalog: catalog.into(),
            manifest,
            state: Arc::new(RwLock::new(WorkerState::Installing)),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn manifest(&self) -> &PrecacheManifest {
        &self.manifest
    }

    /// A request interceptor sharing this worker's store and client.
    pub fn intercept(&self) -> FetchIntercept {
        FetchIntercept::new(self.store.clone(), self.client.clone(), self.catalog.clone())
    }

    /// Precache every manifest asset into the shell namespace. Fails as
    /// a whole: any asset error leaves the worker in `Installing` and
    /// the shell is not considered usable.
    pub async fn install(&self) -> EngineResult<()> {
        info!(
            version = %self.manifest.version,
            assets = self.manifest.len(),
            "Installing shell precache."
        );

        for asset in &self.manifest.assets {
            let resource = self.client.get_fresh(&asset.url).await?;
            let metadata = EntryMetadata::new(asset.url.clone(), resource.body.len() as u64)
                .with_content_type_option(resource.content_type.clone())
                .with_revision_option(asset.revision.clone());
            self.store
                .put(EntryKey::shell(&asset.url), resource.body, metadata)
                .await?;
            debug!(url = %asset.url, "Precached shell asset.");
        }

        *self.state.write() = WorkerState::Installed;
        info!(version = %self.manifest.version, "Shell precache installed.");
        Ok(())
    }

    /// Purge shell entries the current manifest no longer names. Only
    /// the shell namespace is touched; downloaded content always
    /// survives activation.
    pub async fn activate(&self) -> EngineResult<()> {
        *self.state.write() = WorkerState::Activating;

        let mut purged = 0usize;
        for path in self.store.keys(CacheNamespace::AppShell).await? {
            if !self.manifest.contains_path(&path) {
                self.store.remove(&EntryKey::shell(&path)).await?;
                debug!(path = %path, "Purged stale shell asset.");
                purged += 1;
            }
        }

        *self.state.write() = WorkerState::Activated;
        info!(version = %self.manifest.version, purged, "Shell activated.");
        Ok(())
    }

    /// Spawn the command loop. The returned handle issues commands; the
    /// join handle completes once the channel closes or shutdown fires.
    pub fn spawn(
        self,
        buffer: usize,
        shutdown: broadcast::Receiver<()>,
    ) -> (WorkerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer);
        let handle = WorkerHandle {
            tx,
            state: Arc::clone(&self.state),
        };
        let join = tokio::spawn(self.run(rx, shutdown));
        (handle, join)
    }

    async fn run(
        self,
        mut rx: mpsc::Receiver<WorkerMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("ContentWorker started.");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!("Shutdown signal received. ContentWorker stopping.");
                    break;
                }

                maybe_message = rx.recv() => {
                    match maybe_message {
                        Some(message) => {
                            let result = self.execute(&message.command).await;
                            if let Err(e) = &result {
                                warn!(command = ?message.command, error = %e, "Worker command failed.");
                            }
                            if let Some(reply) = message.reply {
                                // The issuer may have gone away; losing the
                                // reply is fine for an idempotent command.
                                let _ = reply.send(result);
                            }
                        }
                        None => {
                            info!("Command channel closed. ContentWorker stopping.");
                            break;
                        }
                    }
                }
            }
        }

        info!("ContentWorker finished.");
    }

    async fn execute(&self, command: &WorkerCommand) -> EngineResult<()> {
        match command {
            WorkerCommand::Download { id, assets } => {
                self.execute_download(id, assets.as_deref()).await
            }
            WorkerCommand::Remove { id } => self.execute_remove(id).await,
            WorkerCommand::ActivateUpdate => {
                // Only a waiting install may be promoted; promoting an
                // incomplete install would activate over an empty shell.
                let state = self.state();
                if state == WorkerState::Installed {
                    self.activate().await
                } else {
                    warn!(state = %state, "Ignoring activate-update without a waiting install.");
                    Ok(())
                }
            }
        }
    }

    /// Fetch the pack fresh and store it, then prefetch a bounded
    /// number of its assets. Asset failures are logged and swallowed;
    /// only the pack data itself decides the command outcome.
    async fn execute_download(&self, id: &str, assets: Option<&[String]>) -> EngineResult<()> {
        let data_path = pack_data_path(&self.catalog, id);
        let resource = self.client.get_fresh(&data_path).await?;
        let metadata = EntryMetadata::new(data_path.clone(), resource.body.len() as u64)
            .with_content_type_option(resource.content_type.clone());
        self.store
            .put(EntryKey::content(&data_path), resource.body, metadata)
            .await?;
        debug!(id = %id, "Stored pack data.");

        if let Some(assets) = assets {
            let bounded = &assets[..assets.len().min(MAX_COMMAND_ASSETS)];
            if bounded.len() < assets.len() {
                warn!(
                    id = %id,
                    requested = assets.len(),
                    limit = MAX_COMMAND_ASSETS,
                    "Truncating asset prefetch list."
                );
            }
            let fetches = bounded.iter().map(|url| self.prefetch_asset(url));
            futures::future::join_all(fetches).await;
        }
        Ok(())
    }

    async fn prefetch_asset(&self, url: &str) {
        match self.client.get(url).await {
            Ok(resource) => {
                let metadata = EntryMetadata::new(url.to_string(), resource.body.len() as u64)
                    .with_content_type_option(resource.content_type.clone());
                if let Err(e) = self
                    .store
                    .put(EntryKey::content(url), resource.body, metadata)
                    .await
                {
                    warn!(url = %url, error = %e, "Failed to store prefetched asset.");
                } else {
                    debug!(url = %url, "Prefetched asset.");
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Asset prefetch failed.");
            }
        }
    }

    /// Drop the pack's stored data. Removing a pack that was never
    /// stored succeeds.
    async fn execute_remove(&self, id: &str) -> EngineResult<()> {
        let data_path = pack_data_path(&self.catalog, id);
        self.store.remove(&EntryKey::content(&data_path)).await?;
        debug!(id = %id, "Removed pack data.");
        Ok(())
    }
}

/// Cheap cloneable handle for issuing commands to a spawned worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,
    state: Arc<RwLock<WorkerState>>,
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    /// Fire-and-forget. A full or closed channel drops the command with
    /// a warning; callers relying on the outcome use
    /// [`execute`](Self::execute).
    pub fn notify(&self, command: WorkerCommand) {
        if let Err(e) = self.tx.try_send(WorkerMessage::notify(command)) {
            warn!(error = %e, "Dropped worker notification.");
        }
    }

    /// Send a command and wait for its outcome.
    pub async fn execute(&self, command: WorkerCommand) -> EngineResult<()> {
        let (message, reply) = WorkerMessage::request(command);
        self.tx
            .send(message)
            .await
            .map_err(|_| EngineError::WorkerUnavailable)?;
        reply.await.map_err(|_| EngineError::WorkerUnavailable)?
    }
}
