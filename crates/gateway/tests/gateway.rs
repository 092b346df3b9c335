//! End-to-end gateway tests against a real listener and a mock upstream.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use url::Url;
use wiremock::matchers::{method, path as url_path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use waypack_engine::store::StoreConfig;
use waypack_engine::types::{catalog_index_path, pack_data_path};
use waypack_engine::worker::SHELL_DOCUMENT;
use waypack_engine::{ContentStore, EngineConfig, EntryKey, EntryMetadata, FetchClient};
use waypack_gateway::{GatewayState, SOURCE_HEADER, serve};

const CATALOG: &str = "city-packs";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("waypack_gateway=debug,waypack_engine=debug")
        .with_test_writer()
        .try_init();
}

struct Harness {
    base: String,
    store: ContentStore,
    _shutdown: broadcast::Sender<()>,
    _dir: tempfile::TempDir,
}

/// Boot a gateway over a fresh store pointing at `origin`.
async fn start_gateway(origin: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::builder()
        .with_origin(origin)
        .with_data_dir(dir.path())
        .with_timeout(Duration::from_millis(500))
        .with_connect_timeout(Duration::from_millis(500))
        .build();

    let store = ContentStore::new(StoreConfig {
        root_dir: config.store_dir(),
        max_memory_bytes: config.max_memory_cache_size,
    })
    .await
    .unwrap();
    let client = FetchClient::new(&config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{addr}");
    let public_origin = Url::parse(&base).unwrap();

    let intercept = waypack_engine::worker::FetchIntercept::new(
        store.clone(),
        client.clone(),
        CATALOG,
    );
    let state = GatewayState::new(intercept, store.clone(), client, CATALOG, public_origin);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(serve(listener, state, shutdown_rx));

    Harness {
        base,
        store,
        _shutdown: shutdown_tx,
        _dir: dir,
    }
}

async fn seed_entry(store: &ContentStore, key: EntryKey, body: &str, content_type: &str) {
    let metadata =
        EntryMetadata::new(key.path.clone(), body.len() as u64).with_content_type(content_type);
    store
        .put(key, bytes::Bytes::from(body.to_string()), metadata)
        .await
        .unwrap();
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn navigation_to_unknown_route_serves_the_shell_offline() {
    init_tracing();
    // Unreachable upstream: the gateway is effectively offline.
    let harness = start_gateway("http://127.0.0.1:9").await;
    seed_entry(
        &harness.store,
        EntryKey::shell(SHELL_DOCUMENT),
        "<html>shell</html>",
        "text/html",
    )
    .await;

    let response = http()
        .get(format!("{}/city/does-not-exist", harness.base))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get(SOURCE_HEADER).unwrap(),
        "cache"
    );
    // The URL is preserved, no redirect happened.
    assert!(response.url().path().ends_with("/city/does-not-exist"));
    assert_eq!(response.text().await.unwrap(), "<html>shell</html>");
}

#[tokio::test]
async fn downloaded_pack_data_is_served_from_cache() {
    init_tracing();
    let harness = start_gateway("http://127.0.0.1:9").await;
    let data_path = pack_data_path(CATALOG, "paris");
    seed_entry(
        &harness.store,
        EntryKey::content(&data_path),
        r#"{"slug":"paris","city":"Paris","country":"France","region":"Europe","version":1,"updatedAt":"2025-10-01T00:00:00Z"}"#,
        "application/json",
    )
    .await;

    let response = http()
        .get(format!("{}{}", harness.base, data_path))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get(SOURCE_HEADER).unwrap(), "cache");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["slug"], "paris");
}

#[tokio::test]
async fn undownloaded_pack_offline_reports_not_available() {
    init_tracing();
    let harness = start_gateway("http://127.0.0.1:9").await;

    let response = http()
        .get(format!(
            "{}{}",
            harness.base,
            pack_data_path(CATALOG, "london")
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "not available offline");
    assert_eq!(body["id"], "london");
}

#[tokio::test]
async fn catalog_index_passes_through_to_the_upstream() {
    init_tracing();
    let upstream = MockServer::start().await;
    let index_path = catalog_index_path(CATALOG);
    Mock::given(method("GET"))
        .and(url_path(index_path.clone()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"generatedAt":"2025-10-01T00:00:00Z","total":0,"items":[]}"#),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let harness = start_gateway(&upstream.uri()).await;
    let response = http()
        .get(format!("{}{}", harness.base, index_path))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get(SOURCE_HEADER).unwrap(), "network");
    upstream.verify().await;
}

#[tokio::test]
async fn identity_endpoint_disables_caching_and_uses_the_cached_title() {
    init_tracing();
    let harness = start_gateway("http://127.0.0.1:9").await;
    let data_path = pack_data_path(CATALOG, "new-york");
    seed_entry(
        &harness.store,
        EntryKey::content(&data_path),
        r#"{"slug":"new-york","city":"New York City","country":"USA","region":"North America","version":1,"updatedAt":"2025-10-01T00:00:00Z"}"#,
        "application/json",
    )
    .await;

    let response = http()
        .get(format!("{}/identity/new-york", harness.base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/manifest+json"
    );
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "no-cache, no-store, must-revalidate, max-age=0"
    );
    assert_eq!(response.headers().get("pragma").unwrap(), "no-cache");

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["id"], "/city/new-york");
    assert_eq!(body["name"], "New York City Travel Pack");
    assert_eq!(body["short_name"], "New York City");
    assert_eq!(body["display"], "standalone");
    assert_eq!(
        body["start_url"],
        format!("{}/city/new-york", harness.base)
    );
}

#[tokio::test]
async fn identity_endpoint_falls_back_to_the_slug_title() {
    init_tracing();
    // Nothing cached and no upstream: the slug decides the title.
    let harness = start_gateway("http://127.0.0.1:9").await;

    let response = http()
        .get(format!("{}/identity/kuala-lumpur", harness.base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Kuala Lumpur Travel Pack");
}

#[tokio::test]
async fn identity_start_url_override_is_honored() {
    init_tracing();
    let harness = start_gateway("http://127.0.0.1:9").await;

    let response = http()
        .get(format!(
            "{}/identity/paris?start_url=/city/paris",
            harness.base
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["start_url"], format!("{}/city/paris", harness.base));
}

#[tokio::test]
async fn shell_assets_are_served_from_the_shell_namespace() {
    init_tracing();
    let harness = start_gateway("http://127.0.0.1:9").await;
    seed_entry(
        &harness.store,
        EntryKey::shell("/assets/app.js"),
        "console.log('app')",
        "text/javascript",
    )
    .await;

    let response = http()
        .get(format!("{}/assets/app.js", harness.base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get(SOURCE_HEADER).unwrap(), "cache");
    assert_eq!(response.text().await.unwrap(), "console.log('app')");
}
