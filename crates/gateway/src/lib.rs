//! # Waypack Gateway
//!
//! HTTP surface over the engine's interception policy: navigations fall
//! back to the cached shell at the original URL, pack data is served
//! cache-first, the catalog index passes through, and the installable
//! identity for any pack route is rendered server-side with caching
//! disabled. The `X-Waypack-Source` response header reports whether a
//! body came from the cache or the network.

use axum::Router;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use url::Url;

use waypack_engine::identity::pack_identity;
use waypack_engine::types::{CityPack, pack_data_path};
use waypack_engine::worker::{FetchIntercept, InterceptRequest, InterceptResponse, ServeSource};
use waypack_engine::{ContentStore, EngineError, EntryKey, FetchClient};

/// Response header naming where a body came from.
pub const SOURCE_HEADER: &str = "x-waypack-source";

/// Shared state behind every route.
#[derive(Clone)]
pub struct GatewayState {
    intercept: FetchIntercept,
    store: ContentStore,
    client: FetchClient,
    catalog: String,
    public_origin: Url,
}

impl GatewayState {
    /// `public_origin` is the externally visible base URL of this
    /// gateway; identity descriptors embed it in `start_url` and
    /// `scope`.
    pub fn new(
        intercept: FetchIntercept,
        store: ContentStore,
        client: FetchClient,
        catalog: impl Into<String>,
        public_origin: Url,
    ) -> Self {
        Self {
            intercept,
            store,
            client,
            catalog: catalog.into(),
            public_origin,
        }
    }
}

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/identity/{id}", get(identity))
        .route("/data/{catalog}/{resource}", get(data))
        .fallback(get(fallback))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the gateway until the shutdown channel fires.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Gateway listening.");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            info!("Shutdown signal received. Gateway stopping.");
        })
        .await
}

#[derive(Debug, Deserialize)]
struct IdentityQuery {
    start_url: Option<String>,
}

/// `GET /identity/{id}` — the server-rendered installable identity for
/// one pack route. Always fresh: identity is route-specific and must
/// never be served stale.
async fn identity(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Query(query): Query<IdentityQuery>,
) -> Response {
    let title = resolve_city_title(&state, &id).await;
    let mut descriptor = pack_identity(&state.public_origin, &id, title.as_deref());

    // Optional explicit start_url override, same-origin paths only.
    if let Some(path) = query.start_url.as_deref() {
        if path.starts_with('/') {
            if let Ok(url) = state.public_origin.join(path) {
                descriptor.id = path.to_string();
                descriptor.start_url = url.into();
            }
        }
    }

    let mut response = axum::Json(descriptor).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/manifest+json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate, max-age=0"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}

/// Best title source first: the downloaded pack in the content store,
/// then the upstream resource. Failures degrade to the slug-derived
/// fallback inside the descriptor builder; this never errors.
async fn resolve_city_title(state: &GatewayState, slug: &str) -> Option<String> {
    let data_path = pack_data_path(&state.catalog, slug);

    match state.store.get(&EntryKey::content(&data_path)).await {
        Ok(Some(entry)) => {
            if let Ok(pack) = serde_json::from_slice::<CityPack>(&entry.data) {
                return Some(pack.city);
            }
        }
        Ok(None) => {}
        Err(e) => warn!(slug = %slug, error = %e, "Store lookup failed for identity title"),
    }

    match state.client.get(&data_path).await {
        Ok(resource) => serde_json::from_slice::<CityPack>(&resource.body)
            .ok()
            .map(|pack| pack.city),
        Err(e) => {
            debug!(slug = %slug, error = %e, "Upstream unavailable for identity title");
            None
        }
    }
}

/// `GET /data/{catalog}/{resource}` — the interception policy decides:
/// index passthrough, pack data cache-first, anything else upstream.
async fn data(
    State(state): State<GatewayState>,
    Path((catalog, resource)): Path<(String, String)>,
) -> Response {
    let path = format!("/data/{catalog}/{resource}");
    match state.intercept.handle(&InterceptRequest::resource(&path)).await {
        Ok(response) => intercepted(response),
        Err(e) => error_response(e),
    }
}

/// Everything else. Navigations get the shell document at the original
/// URL with no redirect; other requests are shell-asset lookups that
/// fall through to the upstream.
async fn fallback(
    State(state): State<GatewayState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path().to_string();
    let request = if is_navigation(&headers) {
        InterceptRequest::navigate(&path)
    } else {
        InterceptRequest::resource(&path)
    };

    match state.intercept.handle(&request).await {
        Ok(response) => intercepted(response),
        Err(e) => error_response(e),
    }
}

/// A request is a navigation when the client says so, or when it plainly
/// asks for a document.
fn is_navigation(headers: &HeaderMap) -> bool {
    if let Some(mode) = headers.get("sec-fetch-mode").and_then(|v| v.to_str().ok()) {
        return mode.eq_ignore_ascii_case("navigate");
    }
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

fn intercepted(response: InterceptResponse) -> Response {
    let source = match response.source {
        ServeSource::Cache => "cache",
        ServeSource::Network => "network",
    };

    let mut http = Response::new(response.body.into());
    if let Some(content_type) = response
        .content_type
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        http.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    http.headers_mut()
        .insert(SOURCE_HEADER, HeaderValue::from_static(source));
    http
}

fn error_response(error: EngineError) -> Response {
    let (status, body) = match &error {
        EngineError::NotAvailableOffline { id } => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": "not available offline", "id": id }),
        ),
        EngineError::ShellUnavailable => (
            StatusCode::BAD_GATEWAY,
            json!({ "error": "offline and no cached shell" }),
        ),
        EngineError::Network { url, .. } | EngineError::Timeout { url } => (
            StatusCode::BAD_GATEWAY,
            json!({ "error": "upstream unreachable", "url": url }),
        ),
        EngineError::Status { url, status } => (
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            json!({ "error": "upstream error", "url": url }),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": error.to_string() }),
        ),
    };
    warn!(status = %status, error = %error, "Gateway request failed");
    (status, axum::Json(body)).into_response()
}
