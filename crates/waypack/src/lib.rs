//! # Waypack Engine
//!
//! Offline-first synchronization engine for city travel packs.
//! Downloads catalog content units into a durable two-namespace cache,
//! keeps a persistent ledger of what is available offline, and runs a
//! background worker task that serves intercepted requests cache-first.
//!
//! ## Features
//!
//! - Durable content store with an in-memory read-through tier
//! - Foreground download manager with transient status overlay
//! - Background worker with install/activate lifecycle and command channel
//! - Per-route installable identity with scoped activation guards

pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod manager;
pub mod store;
pub mod types;
pub mod worker;

pub use client::{FetchClient, FetchedResource};
pub use config::{ConsistencyPolicy, EngineConfig, EngineConfigBuilder};
pub use error::{EngineError, EngineResult};
pub use ledger::{DownloadLedger, DownloadRecord, LEDGER_FILE};
pub use manager::DownloadManager;
pub use store::{CacheNamespace, ContentStore, EntryKey, EntryMetadata, StoreConfig, StoredEntry};
pub use types::{
    CatalogIndex, CityPack, DEFAULT_CATALOG, DownloadStatus, PackSummary, catalog_index_path,
    pack_data_path, route_path,
};
pub use worker::{
    FetchIntercept, InterceptRequest, InterceptResponse, MAX_COMMAND_ASSETS, PrecacheAsset,
    PrecacheManifest, RequestMode, SHELL_DOCUMENT, ServeSource, WorkerCommand, WorkerHandle,
    WorkerRuntime, WorkerState,
};

pub use identity::{
    HeadSlot, IdentityDescriptor, IdentityHost, IdentityIcon, IdentityPublication, RouteIdentity,
    RouteIdentityGuard, default_identity, pack_identity,
};
