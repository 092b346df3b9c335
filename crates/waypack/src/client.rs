use bytes::Bytes;
use reqwest::Client;
use reqwest::header;
use rustls::{ClientConfig, crypto::aws_lc_rs};
use rustls_platform_verifier::BuilderVerifierExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// A fetched upstream resource: body plus the bits of response metadata
/// the cache keeps.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// HTTP client for the pack origin.
///
/// All engine fetches go through here so that timeout handling and the
/// cache-bypass request shape stay in one place.
#[derive(Clone)]
pub struct FetchClient {
    client: Client,
    origin: Url,
}

impl FetchClient {
    /// Create a client from the engine configuration.
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let origin = Url::parse(&config.origin).map_err(|e| {
            EngineError::InvalidResource(format!("invalid origin {}: {e}", config.origin))
        })?;

        // Build platform default TLS configuration
        let provider = Arc::new(aws_lc_rs::default_provider());
        let tls_config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| EngineError::Tls(e.to_string()))?
            .with_platform_verifier()
            .map_err(|e| EngineError::Tls(e.to_string()))?
            .with_no_client_auth();

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .user_agent(&config.user_agent)
            .use_preconfigured_tls(tls_config)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(EngineError::Http)?;

        Ok(Self { client, origin })
    }

    /// The configured upstream origin.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolve a path against the origin. Absolute URLs pass through
    /// unchanged, which lets hero assets live on a CDN.
    fn resolve(&self, path: &str) -> EngineResult<Url> {
        self.origin
            .join(path)
            .map_err(|e| EngineError::InvalidResource(format!("invalid path {path}: {e}")))
    }

    /// Plain GET of `path`, returning the body on a success status.
    pub async fn get(&self, path: &str) -> EngineResult<FetchedResource> {
        self.fetch(path, false).await
    }

    /// GET of `path` instructing every cache along the way to stand
    /// aside. Download operations use this so a stale intermediary can
    /// never satisfy an explicit download.
    pub async fn get_fresh(&self, path: &str) -> EngineResult<FetchedResource> {
        self.fetch(path, true).await
    }

    /// Fetch `path` and deserialize the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> EngineResult<T> {
        let fetched = self.get_fresh(path).await?;
        serde_json::from_slice(&fetched.body)
            .map_err(|e| EngineError::InvalidResource(format!("{path}: {e}")))
    }

    async fn fetch(&self, path: &str, fresh: bool) -> EngineResult<FetchedResource> {
        let url = self.resolve(path)?;
        let mut request = self.client.get(url.clone());
        if fresh {
            request = request
                .header(header::CACHE_CONTROL, "no-store")
                .header(header::PRAGMA, "no-cache");
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Status {
                url: url.to_string(),
                status,
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response
            .bytes()
            .await
            .map_err(|e| EngineError::from_reqwest(url.as_str(), e))?;

        debug!(url = %url, bytes = body.len(), fresh, "fetched resource");
        Ok(FetchedResource { body, content_type })
    }
}
