//! Installable identity descriptors.
//!
//! The descriptor is the document a platform dereferences when the user
//! adds a shortcut to their home screen. One default descriptor points
//! at the catalog root; per-pack descriptors open directly on the
//! pack's route.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::route_path;

pub const DEFAULT_NAME: &str = "Local City Travel Packs";
pub const DEFAULT_SHORT_NAME: &str = "Travel Packs";
pub const DEFAULT_DESCRIPTION: &str = "Offline-first city travel packs platform.";

const BACKGROUND_COLOR: &str = "#ffffff";
const THEME_COLOR: &str = "#0f172a";

/// One icon entry of a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityIcon {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub icon_type: String,
    pub purpose: String,
}

impl IdentityIcon {
    fn png(src: String, sizes: &str) -> Self {
        Self {
            src,
            sizes: sizes.to_string(),
            icon_type: "image/png".to_string(),
            purpose: "any maskable".to_string(),
        }
    }
}

/// The installable-shortcut identity published for one route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityDescriptor {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub start_url: String,
    pub scope: String,
    pub display: String,
    pub background_color: String,
    pub theme_color: String,
    pub icons: Vec<IdentityIcon>,
}

fn icons(origin: &Url) -> Vec<IdentityIcon> {
    vec![
        IdentityIcon::png(absolute(origin, "/pwa-192x192.png"), "192x192"),
        IdentityIcon::png(absolute(origin, "/pwa-512x512.png"), "512x512"),
    ]
}

fn absolute(origin: &Url, path: &str) -> String {
    origin
        .join(path)
        .map(String::from)
        .unwrap_or_else(|_| path.to_string())
}

/// The catalog-root identity, published whenever no pack route is
/// active.
pub fn default_identity(origin: &Url) -> IdentityDescriptor {
    IdentityDescriptor {
        id: "/".to_string(),
        name: DEFAULT_NAME.to_string(),
        short_name: DEFAULT_SHORT_NAME.to_string(),
        description: DEFAULT_DESCRIPTION.to_string(),
        start_url: absolute(origin, "/"),
        scope: absolute(origin, "/"),
        display: "standalone".to_string(),
        background_color: BACKGROUND_COLOR.to_string(),
        theme_color: THEME_COLOR.to_string(),
        icons: icons(origin),
    }
}

/// Identity for one pack route. When no richer title is available the
/// name degrades to a slug-derived one; this path never fails.
pub fn pack_identity(origin: &Url, slug: &str, city: Option<&str>) -> IdentityDescriptor {
    let city = match city {
        Some(city) if !city.trim().is_empty() => city.trim().to_string(),
        _ => title_from_slug(slug),
    };
    let path = route_path(slug);

    IdentityDescriptor {
        id: path.clone(),
        name: format!("{city} Travel Pack"),
        short_name: city.clone(),
        description: format!("Offline-first travel guide for {city}"),
        start_url: absolute(origin, &path),
        scope: absolute(origin, "/"),
        display: "standalone".to_string(),
        background_color: BACKGROUND_COLOR.to_string(),
        theme_color: THEME_COLOR.to_string(),
        icons: icons(origin),
    }
}

/// Human title for a slug: "new-york" becomes "New York".
pub fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://packs.example.net").unwrap()
    }

    #[test]
    fn slug_titles_are_capitalized_per_word() {
        assert_eq!(title_from_slug("new-york"), "New York");
        assert_eq!(title_from_slug("paris"), "Paris");
        assert_eq!(title_from_slug("rio-de-janeiro"), "Rio De Janeiro");
    }

    #[test]
    fn pack_identity_prefers_the_given_city_name() {
        let descriptor = pack_identity(&origin(), "new-york", Some("New York City"));
        assert_eq!(descriptor.id, "/city/new-york");
        assert_eq!(descriptor.name, "New York City Travel Pack");
        assert_eq!(descriptor.short_name, "New York City");
        assert_eq!(
            descriptor.start_url,
            "https://packs.example.net/city/new-york"
        );
        assert_eq!(descriptor.scope, "https://packs.example.net/");
    }

    #[test]
    fn pack_identity_falls_back_to_the_slug() {
        let descriptor = pack_identity(&origin(), "new-york", None);
        assert_eq!(descriptor.name, "New York Travel Pack");

        let blank = pack_identity(&origin(), "lisbon", Some("   "));
        assert_eq!(blank.short_name, "Lisbon");
    }

    #[test]
    fn default_identity_targets_the_catalog_root() {
        let descriptor = default_identity(&origin());
        assert_eq!(descriptor.id, "/");
        assert_eq!(descriptor.name, DEFAULT_NAME);
        assert_eq!(descriptor.start_url, "https://packs.example.net/");
        assert_eq!(descriptor.display, "standalone");
        assert_eq!(descriptor.icons.len(), 2);
    }

    #[test]
    fn descriptor_serializes_with_manifest_field_names() {
        let json = serde_json::to_value(default_identity(&origin())).unwrap();
        assert!(json["short_name"].is_string());
        assert!(json["background_color"].is_string());
        assert_eq!(json["icons"][0]["type"], "image/png");
        assert_eq!(json["icons"][0]["purpose"], "any maskable");
    }
}
