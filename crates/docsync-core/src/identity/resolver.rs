//! Rewriting link targets between native and stable form

use chrono::Utc;
use docsync_content::{Document, LinkReference, LinkTarget, StableId};

use super::map::IdentityMap;
use super::registry::{NativeRef, PendingReference, ReferenceRegistry};
use crate::detect::Side;

/// Which way a document is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Freshly decoded from a native store; native references become
    /// stable ids.
    Inbound,
    /// About to be encoded for `Side`; stable ids become that side's
    /// native references.
    Outbound(Side),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(LinkTarget),
    /// No pair answers to the reference yet.
    Unresolved(NativeRef),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Resolves links against one cycle's identity map.
///
/// Only targets change; display text and marks are left as found, and
/// resolving an already resolved document is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct LinkResolver<'a> {
    map: &'a IdentityMap,
    registry: &'a ReferenceRegistry,
}

impl<'a> LinkResolver<'a> {
    pub fn new(map: &'a IdentityMap, registry: &'a ReferenceRegistry) -> Self {
        Self { map, registry }
    }

    pub fn resolve(&self, target: &LinkTarget, direction: Direction) -> Resolution {
        match direction {
            Direction::Inbound => self.resolve_inbound(target),
            Direction::Outbound(side) => Resolution::Resolved(self.resolve_outbound(target, side)),
        }
    }

    fn resolve_inbound(&self, target: &LinkTarget) -> Resolution {
        let (native_ref, bound) = match target {
            LinkTarget::Resolved(id) => (
                NativeRef::Stable(*id),
                self.map.binding(*id).map(|b| b.stable_id),
            ),
            LinkTarget::Remote(remote_id) => (NativeRef::Remote(remote_id.clone()), self.map.by_remote(remote_id)),
            LinkTarget::Local(name) => (NativeRef::Local(name.clone()), self.map.by_wikilink(name)),
            LinkTarget::Url(_) | LinkTarget::Tombstone(_) => return Resolution::Resolved(target.clone()),
        };

        if let Some(id) = bound {
            return Resolution::Resolved(LinkTarget::Resolved(id));
        }
        match self.registry.tombstone_for(&native_ref) {
            Some(tombstone) => Resolution::Resolved(LinkTarget::Tombstone(tombstone.name.clone())),
            None => Resolution::Unresolved(native_ref),
        }
    }

    fn resolve_outbound(&self, target: &LinkTarget, side: Side) -> LinkTarget {
        let LinkTarget::Resolved(id) = target else {
            return target.clone();
        };
        let native = match side {
            Side::Local => self.map.wikilink_name(*id).map(LinkTarget::Local),
            Side::Remote => self
                .map
                .binding(*id)
                .and_then(|b| b.remote_id.clone())
                .map(LinkTarget::Remote),
        };
        native.unwrap_or_else(|| target.clone())
    }

    /// Resolve every link in a decoded document.
    ///
    /// References that stay unresolved are appended to `pending`, keyed by
    /// the document that holds them.
    pub fn inbound(&self, document: &Document, referenced_by: StableId, pending: &mut Vec<PendingReference>) -> Document {
        let mut resolved = document.clone();
        let mut rewrite = |link: &mut LinkReference| match self.resolve_inbound(&link.target) {
            Resolution::Resolved(target) => link.target = target,
            Resolution::Unresolved(native_ref) => pending.push(PendingReference {
                native_ref,
                referenced_by,
                first_seen: Utc::now(),
            }),
        };
        resolved.tree.for_each_link_mut(&mut rewrite);
        resolved.properties.for_each_link_mut(&mut rewrite);
        resolved
    }

    /// Rewrite stable ids into the native references `side` understands.
    pub fn outbound(&self, document: &Document, side: Side) -> Document {
        let mut native = document.clone();
        let mut rewrite = |link: &mut LinkReference| link.target = self.resolve_outbound(&link.target, side);
        native.tree.for_each_link_mut(&mut rewrite);
        native.properties.for_each_link_mut(&mut rewrite);
        native
    }
}
