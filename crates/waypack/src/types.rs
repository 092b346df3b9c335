//! Data model for catalog listings and city packs, plus the canonical
//! path conventions shared by the download manager, the worker, and the
//! gateway.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog name used when none is configured.
pub const DEFAULT_CATALOG: &str = "city-packs";

/// Download state of a single pack as seen by the UI.
///
/// `Downloading` and `Error` are transient, in-memory only; `Downloaded`
/// is derived from ledger presence. A transient value always wins over
/// the ledger-derived one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadStatus {
    NotDownloaded,
    Downloading,
    Downloaded,
    Error,
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DownloadStatus::NotDownloaded => "not-downloaded",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// One entry of the catalog index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackSummary {
    pub slug: String,
    pub city: String,
    pub country: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_image: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog listing served at the index path. Never selectively cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogIndex {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub items: Vec<PackSummary>,
}

/// One titled section of a pack (essentials, transit, food, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackSection {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_alert: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tips: Vec<String>,
}

/// Local currency metadata carried by a pack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Currency {
    pub code: String,
    pub symbol: String,
}

/// Geographic coordinates of the covered city.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A complete content unit. The engine treats the canonical resource as
/// immutable; it only fetches and caches it, never rewrites it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityPack {
    pub slug: String,
    pub city: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    pub region: String,
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sections: BTreeMap<String, PackSection>,
}

/// Canonical resource path for one pack: `/data/<catalog>/<slug>.json`.
pub fn pack_data_path(catalog: &str, slug: &str) -> String {
    format!("/data/{catalog}/{slug}.json")
}

/// Catalog listing path: `/data/<catalog>/index.json`.
pub fn catalog_index_path(catalog: &str) -> String {
    format!("/data/{catalog}/index.json")
}

/// Client-side route for one pack: `/city/<slug>`.
pub fn route_path(slug: &str) -> String {
    format!("/city/{slug}")
}

/// Extract the pack slug from a content-resource path, or `None` when the
/// path does not follow the convention. The index listing is deliberately
/// excluded so it is never treated as per-pack content.
pub fn slug_from_data_path<'a>(catalog: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix("/data/")?;
    let rest = rest.strip_prefix(catalog)?;
    let rest = rest.strip_prefix('/')?;
    let slug = rest.strip_suffix(".json")?;
    if slug.is_empty() || slug == "index" || slug.contains('/') {
        return None;
    }
    Some(slug)
}

/// Extract the pack slug from a client-side route such as `/city/<slug>`.
pub fn slug_from_route(path: &str) -> Option<&str> {
    let slug = path.strip_prefix("/city/")?;
    if slug.is_empty() || slug.contains('/') {
        return None;
    }
    Some(slug)
}
