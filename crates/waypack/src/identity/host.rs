//! The identity publication port.
//!
//! The platform surface exposes exactly one identity-reference slot.
//! [`IdentityHost`] is the narrow port over that slot; [`HeadSlot`] is
//! the in-process adapter, which also lets tests observe what is
//! currently published without a real rendering surface.

use parking_lot::RwLock;

use super::descriptor::IdentityDescriptor;

/// Everything swapped together on a route change: the descriptor plus
/// the document metadata that must match it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPublication {
    pub descriptor: IdentityDescriptor,
    pub document_title: String,
    pub canonical_url: String,
}

/// Port for publishing the single active identity. `publish` replaces
/// whatever was active before; there is never more than one.
pub trait IdentityHost: Send + Sync {
    fn publish(&self, publication: IdentityPublication);
}

/// In-process identity slot.
pub struct HeadSlot {
    current: RwLock<IdentityPublication>,
}

impl HeadSlot {
    pub fn new(initial: IdentityPublication) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// The publication currently occupying the slot.
    pub fn current(&self) -> IdentityPublication {
        self.current.read().clone()
    }
}

impl IdentityHost for HeadSlot {
    fn publish(&self, publication: IdentityPublication) {
        *self.current.write() = publication;
    }
}
