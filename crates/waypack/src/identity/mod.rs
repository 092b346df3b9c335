//! # Route Identity
//!
//! Keeps the installable identity in step with the currently viewed
//! pack. Entering a pack route publishes a pack-specific descriptor to
//! the single identity slot; leaving reverts to the catalog-root
//! default. Activations hand back a guard whose drop performs the
//! revert, and a generation counter keeps a stale guard from clobbering
//! a newer route's identity.

pub mod descriptor;
pub mod host;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use url::Url;

pub use descriptor::{
    IdentityDescriptor, IdentityIcon, default_identity, pack_identity, title_from_slug,
};
pub use host::{HeadSlot, IdentityHost, IdentityPublication};

use crate::types::slug_from_route;

/// Manager of the single published identity.
#[derive(Clone)]
pub struct RouteIdentity {
    origin: Url,
    host: Arc<dyn IdentityHost>,
    generation: Arc<AtomicU64>,
}

impl RouteIdentity {
    pub fn new(origin: Url, host: Arc<dyn IdentityHost>) -> Self {
        Self {
            origin,
            host,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The default publication for this origin.
    pub fn default_publication(origin: &Url) -> IdentityPublication {
        let descriptor = default_identity(origin);
        IdentityPublication {
            document_title: descriptor.name.clone(),
            canonical_url: descriptor.start_url.clone(),
            descriptor,
        }
    }

    /// Publish the identity for a pack route. `title` is the richer
    /// city name when known; `None` degrades to a slug-derived title
    /// and never fails. Publishing swaps the slot, which releases the
    /// previous publication in the same step.
    pub fn activate_for_route(&self, path: &str, title: Option<&str>) -> RouteIdentityGuard {
        let descriptor = match slug_from_route(path) {
            Some(slug) => pack_identity(&self.origin, slug, title),
            // A non-pack route keeps the default identity but still
            // yields a guard so exits are uniform.
            None => default_identity(&self.origin),
        };

        let publication = IdentityPublication {
            document_title: descriptor.name.clone(),
            canonical_url: descriptor.start_url.clone(),
            descriptor,
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(path = %path, generation, "Published route identity");
        self.host.publish(publication);

        RouteIdentityGuard {
            identity: self.clone(),
            generation,
        }
    }

    /// Revert the slot to the catalog-root identity.
    pub fn deactivate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.host.publish(Self::default_publication(&self.origin));
        debug!("Reverted to default identity");
    }

    fn deactivate_if_current(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.deactivate();
        }
    }
}

/// Scoped activation. Dropping the guard reverts to the default
/// identity unless a newer activation has replaced it in the meantime.
pub struct RouteIdentityGuard {
    identity: RouteIdentity,
    generation: u64,
}

impl RouteIdentityGuard {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RouteIdentityGuard {
    fn drop(&mut self) {
        self.identity.deactivate_if_current(self.generation);
    }
}
