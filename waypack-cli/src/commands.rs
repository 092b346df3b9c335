//! Subcommand implementations over the engine and the gateway.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};
use url::Url;

use waypack_engine::store::StoreConfig;
use waypack_engine::types::{CatalogIndex, catalog_index_path};
use waypack_engine::worker::{FetchIntercept, PrecacheManifest, WorkerRuntime};
use waypack_engine::{
    ConsistencyPolicy, ContentStore, DownloadManager, EngineConfig, FetchClient,
};
use waypack_gateway::GatewayState;

use crate::error::AppError;

pub async fn catalog(config: EngineConfig) -> Result<(), AppError> {
    let client = FetchClient::new(&config)?;
    let index: CatalogIndex = client.get_json(&catalog_index_path(&config.catalog)).await?;

    println!("{} pack(s) in catalog {}:", index.total, config.catalog);
    for item in &index.items {
        println!(
            "  {:<20} {} ({}, {})",
            item.slug, item.city, item.country, item.region
        );
    }
    Ok(())
}

pub async fn status(config: EngineConfig, slug: &str, verify: bool) -> Result<(), AppError> {
    let config = if verify {
        EngineConfig {
            consistency: ConsistencyPolicy::VerifyCache,
            ..config
        }
    } else {
        config
    };

    let manager = DownloadManager::new(config).await?;
    let status = if verify {
        manager.verified_status(slug).await?
    } else {
        manager.status(slug)
    };
    println!("{slug}: {status}");
    Ok(())
}

pub async fn download(config: EngineConfig, slugs: &[String]) -> Result<(), AppError> {
    let manager = DownloadManager::new(config).await?;
    for slug in slugs {
        manager.download(slug).await?;
        println!("downloaded {slug}");
    }
    Ok(())
}

pub async fn remove(config: EngineConfig, slug: &str) -> Result<(), AppError> {
    let manager = DownloadManager::new(config).await?;
    manager.remove(slug).await?;
    println!("removed {slug}");
    Ok(())
}

pub async fn list(config: EngineConfig) -> Result<(), AppError> {
    let manager = DownloadManager::new(config).await?;
    let records = manager.list_downloaded();
    if records.is_empty() {
        println!("no packs downloaded");
        return Ok(());
    }
    for record in records {
        println!("  {:<20} {}", record.id, record.downloaded_at.to_rfc3339());
    }
    Ok(())
}

pub async fn serve(
    config: EngineConfig,
    addr: SocketAddr,
    manifest_path: Option<PathBuf>,
    public_origin: Option<String>,
) -> Result<(), AppError> {
    let store = ContentStore::new(StoreConfig {
        root_dir: config.store_dir(),
        max_memory_bytes: config.max_memory_cache_size,
    })
    .await?;
    let client = FetchClient::new(&config)?;

    let manifest = load_manifest(manifest_path.as_deref())?;
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // A worker that cannot install leaves the gateway fully functional
    // in online-only mode; it is never fatal.
    let runtime = WorkerRuntime::new(
        store.clone(),
        client.clone(),
        config.catalog.clone(),
        manifest,
    );
    let worker = match runtime.install().await {
        Ok(()) => {
            runtime.activate().await?;
            Some(runtime.spawn(config.worker_channel_size, shutdown_tx.subscribe()))
        }
        Err(e) => {
            warn!(error = %e, "Shell install failed; continuing online-only.");
            None
        }
    };

    let listener = TcpListener::bind(addr).await?;
    let public_origin = match public_origin {
        Some(origin) => Url::parse(&origin)
            .map_err(|e| AppError::InvalidInput(format!("invalid public origin: {e}")))?,
        None => Url::parse(&format!("http://{addr}"))
            .map_err(|e| AppError::Initialization(e.to_string()))?,
    };

    let intercept = FetchIntercept::new(store.clone(), client.clone(), config.catalog.clone());
    let state = GatewayState::new(intercept, store, client, config.catalog.clone(), public_origin);

    let gateway = tokio::spawn(waypack_gateway::serve(
        listener,
        state,
        shutdown_tx.subscribe(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Shutting down.");
    let _ = shutdown_tx.send(());

    gateway
        .await
        .map_err(|e| AppError::Initialization(e.to_string()))??;
    if let Some((handle, join)) = worker {
        drop(handle);
        let _ = join.await;
    }
    Ok(())
}

fn load_manifest(path: Option<&Path>) -> Result<PrecacheManifest, AppError> {
    match path {
        Some(path) => {
            let bytes = std::fs::read(path)?;
            Ok(PrecacheManifest::from_json(&bytes)?)
        }
        None => Ok(PrecacheManifest::default()),
    }
}
