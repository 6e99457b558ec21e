//! Persisted memory of dangling and dead references

use chrono::{DateTime, Utc};
use docsync_content::StableId;
use serde::{Deserialize, Serialize};

use super::map::{Binding, wikilink_key};

/// A reference as it appeared in a native document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NativeRef {
    Remote(String),
    Local(String),
    Stable(StableId),
}

impl std::fmt::Display for NativeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "remote:{id}"),
            Self::Local(name) => write!(f, "[[{name}]]"),
            Self::Stable(id) => write!(f, "stable:{id}"),
        }
    }
}

/// A reference that did not resolve; retried every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReference {
    pub native_ref: NativeRef,
    pub referenced_by: StableId,
    pub first_seen: DateTime<Utc>,
}

/// A document confirmed deleted on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub stable_id: StableId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Wikilink keys that used to name the note.
    #[serde(default)]
    pub local_names: Vec<String>,
    /// Last known name, shown in place of the broken link.
    pub name: String,
    pub deleted_at: DateTime<Utc>,
}

impl Tombstone {
    pub fn for_binding(binding: &Binding, deleted_at: DateTime<Utc>) -> Self {
        Self {
            stable_id: binding.stable_id,
            remote_id: binding.remote_id.clone(),
            local_names: binding.local_names(),
            name: binding.display_name(),
            deleted_at,
        }
    }

    fn matches(&self, native_ref: &NativeRef) -> bool {
        match native_ref {
            NativeRef::Remote(id) => self.remote_id.as_deref() == Some(id.as_str()),
            NativeRef::Local(name) => self.local_names.contains(&wikilink_key(name)),
            NativeRef::Stable(id) => self.stable_id == *id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRegistry {
    #[serde(default)]
    pub pending: Vec<PendingReference>,
    #[serde(default)]
    pub tombstones: Vec<Tombstone>,
}

impl ReferenceRegistry {
    /// Most recent tombstone matching the reference.
    pub fn tombstone_for(&self, native_ref: &NativeRef) -> Option<&Tombstone> {
        self.tombstones.iter().rev().find(|t| t.matches(native_ref))
    }

    /// Record a deleted document; pending references to it stop pending.
    pub fn bury(&mut self, tombstone: Tombstone) {
        self.pending.retain(|p| !tombstone.matches(&p.native_ref));
        self.tombstones.retain(|t| t.stable_id != tombstone.stable_id);
        self.tombstones.push(tombstone);
    }

    /// Replace the pending set with this cycle's, keeping first sightings.
    pub fn refresh_pending(&mut self, current: Vec<PendingReference>) {
        let mut next: Vec<PendingReference> = Vec::with_capacity(current.len());
        for mut reference in current {
            if next
                .iter()
                .any(|p| p.native_ref == reference.native_ref && p.referenced_by == reference.referenced_by)
            {
                continue;
            }
            if let Some(seen) = self
                .pending
                .iter()
                .find(|p| p.native_ref == reference.native_ref && p.referenced_by == reference.referenced_by)
            {
                reference.first_seen = seen.first_seen;
            }
            next.push(reference);
        }
        self.pending = next;
    }

    /// Drop tombstones of documents deleted before `cutoff`.
    ///
    /// Placeholders already written stay broken links. A reference that
    /// still names the pruned document natively is pending again.
    pub fn prune_tombstones(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.tombstones.len();
        self.tombstones.retain(|t| t.deleted_at >= cutoff);
        before - self.tombstones.len()
    }

    /// Forget tombstones for ids that are alive again.
    pub fn revive(&mut self, stable_id: StableId) {
        self.tombstones.retain(|t| t.stable_id != stable_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use docsync_fs::NormalizedPath;

    fn pending(native_ref: NativeRef, by: StableId, at: DateTime<Utc>) -> PendingReference {
        PendingReference {
            native_ref,
            referenced_by: by,
            first_seen: at,
        }
    }

    #[test]
    fn refresh_keeps_first_seen_and_drops_resolved() {
        let by = StableId::generate();
        let earlier = Utc::now() - Duration::days(2);
        let mut registry = ReferenceRegistry {
            pending: vec![
                pending(NativeRef::Local("Later".into()), by, earlier),
                pending(NativeRef::Remote("p-1".into()), by, earlier),
            ],
            ..Default::default()
        };

        let now = Utc::now();
        registry.refresh_pending(vec![
            pending(NativeRef::Local("Later".into()), by, now),
            pending(NativeRef::Local("Later".into()), by, now),
        ]);

        assert_eq!(registry.pending, vec![pending(NativeRef::Local("Later".into()), by, earlier)]);
    }

    #[test]
    fn burying_matches_every_former_name() {
        let binding = Binding {
            remote_id: Some("p-7".into()),
            local_path: Some(NormalizedPath::new("notes/Gone.md")),
            ..Binding::new(StableId::generate())
        };
        let by = StableId::generate();
        let mut registry = ReferenceRegistry {
            pending: vec![pending(NativeRef::Local("gone".into()), by, Utc::now())],
            ..Default::default()
        };

        registry.bury(Tombstone::for_binding(&binding, Utc::now()));

        assert!(registry.pending.is_empty());
        let by_remote = registry.tombstone_for(&NativeRef::Remote("p-7".into())).unwrap();
        assert_eq!(by_remote.name, "Gone");
        assert!(registry.tombstone_for(&NativeRef::Local("notes/Gone".into())).is_some());
        assert!(registry.tombstone_for(&NativeRef::Stable(binding.stable_id)).is_some());
        assert!(registry.tombstone_for(&NativeRef::Local("Elsewhere".into())).is_none());
    }

    #[test]
    fn old_tombstones_are_pruned() {
        let now = Utc::now();
        let old = Binding {
            remote_id: Some("p-old".into()),
            ..Binding::new(StableId::generate())
        };
        let recent = Binding {
            remote_id: Some("p-new".into()),
            ..Binding::new(StableId::generate())
        };
        let mut registry = ReferenceRegistry::default();
        registry.bury(Tombstone::for_binding(&old, now - Duration::days(120)));
        registry.bury(Tombstone::for_binding(&recent, now - Duration::days(3)));

        assert_eq!(registry.prune_tombstones(now - Duration::days(90)), 1);
        assert!(registry.tombstone_for(&NativeRef::Remote("p-old".into())).is_none());
        assert!(registry.tombstone_for(&NativeRef::Remote("p-new".into())).is_some());
        assert_eq!(registry.prune_tombstones(now - Duration::days(90)), 0);
    }
}
