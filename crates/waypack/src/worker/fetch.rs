//! Request interception.
//!
//! Mirrors the serving policy of the content worker: navigations fall
//! back to the cached shell document without redirecting, pack data is
//! served cache-first, the catalog index is always fetched fresh, and
//! nothing is ever written to the store on the request path. Stores are
//! only populated by install and by explicit downloads.

use bytes::Bytes;
use tracing::debug;

use crate::client::FetchClient;
use crate::error::{EngineError, EngineResult};
use crate::store::{ContentStore, EntryKey};
use crate::types::{catalog_index_path, slug_from_data_path};
use crate::worker::precache::SHELL_DOCUMENT;

/// How the request reached us. Navigations ask for a document; resource
/// requests ask for data or an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    Resource,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct InterceptRequest {
    pub path: String,
    pub mode: RequestMode,
}

impl InterceptRequest {
    pub fn navigate(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: RequestMode::Navigate,
        }
    }

    pub fn resource(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: RequestMode::Resource,
        }
    }
}

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeSource {
    Cache,
    Network,
}

/// The response produced for an intercepted request.
#[derive(Debug, Clone)]
pub struct InterceptResponse {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub source: ServeSource,
}

/// Serving policy over the two store namespaces plus the network.
#[derive(Clone)]
pub struct FetchIntercept {
    store: ContentStore,
    client: FetchClient,
    catalog: String,
}

impl FetchIntercept {
    pub fn new(store: ContentStore, client: FetchClient, catalog: impl Into<String>) -> Self {
        Self {
            store,
            client,
            catalog: catalog.into(),
        }
    }

    /// Resolve one intercepted request. Never writes to the store.
    pub async fn handle(&self, request: &InterceptRequest) -> EngineResult<InterceptResponse> {
        if request.mode == RequestMode::Navigate {
            return self.serve_navigation(&request.path).await;
        }

        // The catalog index must reflect the server, never a stale copy.
        if request.path == catalog_index_path(&self.catalog) {
            return self.serve_network(&request.path).await;
        }

        if let Some(slug) = slug_from_data_path(&self.catalog, &request.path) {
            return self.serve_pack_data(&request.path, slug).await;
        }

        let key = EntryKey::shell(&request.path);
        if let Some(entry) = self.store.get(&key).await? {
            debug!(path = %request.path, "Serving shell asset from cache");
            return Ok(cached(entry.data, entry.metadata.content_type));
        }

        self.serve_network(&request.path).await
    }

    /// Serve the cached shell document for any navigation, preserving
    /// the requested URL. Falls through to the network when the shell
    /// was never installed.
    async fn serve_navigation(&self, path: &str) -> EngineResult<InterceptResponse> {
        let key = EntryKey::shell(SHELL_DOCUMENT);
        if let Some(entry) = self.store.get(&key).await? {
            debug!(path = %path, "Serving navigation from cached shell");
            return Ok(cached(entry.data, entry.metadata.content_type));
        }

        match self.client.get(path).await {
            Ok(resource) => Ok(networked(resource.body, resource.content_type)),
            Err(e) if is_offline(&e) => {
                debug!(path = %path, "No cached shell and no network");
                Err(EngineError::ShellUnavailable)
            }
            Err(e) => Err(e),
        }
    }

    /// Pack data is cache-first. A miss goes to the network but the
    /// response is not stored; only an explicit download writes pack
    /// data.
    async fn serve_pack_data(&self, path: &str, slug: &str) -> EngineResult<InterceptResponse> {
        let key = EntryKey::content(path);
        if let Some(entry) = self.store.get(&key).await? {
            debug!(slug = %slug, "Serving pack data from cache");
            return Ok(cached(entry.data, entry.metadata.content_type));
        }

        match self.client.get(path).await {
            Ok(resource) => Ok(networked(resource.body, resource.content_type)),
            Err(e) if is_offline(&e) => {
                debug!(slug = %slug, "Pack not cached and network unreachable");
                Err(EngineError::NotAvailableOffline {
                    id: slug.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn serve_network(&self, path: &str) -> EngineResult<InterceptResponse> {
        let resource = self.client.get(path).await?;
        Ok(networked(resource.body, resource.content_type))
    }
}

fn cached(body: Bytes, content_type: Option<String>) -> InterceptResponse {
    InterceptResponse {
        body,
        content_type,
        source: ServeSource::Cache,
    }
}

fn networked(body: Bytes, content_type: Option<String>) -> InterceptResponse {
    InterceptResponse {
        body,
        content_type,
        source: ServeSource::Network,
    }
}

fn is_offline(error: &EngineError) -> bool {
    matches!(
        error,
        EngineError::Network { .. } | EngineError::Timeout { .. }
    )
}
