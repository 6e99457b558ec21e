//! Durable per-pair sync state
//!
//! The state store is the only owner of [`SyncRecord`] and [`SyncLink`]
//! persistence. Everything else reads through it and proposes full
//! replacements; a [`PairCommit`] lands the record and the link together
//! or not at all.

mod file;

pub use file::FileStateStore;

use chrono::{DateTime, Utc};
use docsync_content::{Fingerprint, StableId};
use docsync_fs::NormalizedPath;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::conflict::{ConflictArtifact, DecisionRecord};
use crate::detect::Side;
use crate::identity::ReferenceRegistry;

/// What was true of a pair after its last successful sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub stable_id: StableId,
    pub last_remote_fingerprint: Fingerprint,
    pub last_local_fingerprint: Fingerprint,
    pub last_synced_at: DateTime<Utc>,
    /// Incremented once for every cycle that wrote to either side.
    pub sync_version: u64,
}

impl SyncRecord {
    pub fn last_fingerprint(&self, side: Side) -> &Fingerprint {
        match side {
            Side::Remote => &self.last_remote_fingerprint,
            Side::Local => &self.last_local_fingerprint,
        }
    }
}

/// The native identities bound to one stable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLink {
    pub stable_id: StableId,
    pub remote_id: String,
    /// Vault-relative path of the note.
    pub local_path: NormalizedPath,
    /// Paths the note had before it was renamed; wikilinks naming them
    /// still resolve.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_local_paths: Vec<NormalizedPath>,
}

impl SyncLink {
    pub fn new(stable_id: StableId, remote_id: impl Into<String>, local_path: impl Into<NormalizedPath>) -> Self {
        Self {
            stable_id,
            remote_id: remote_id.into(),
            local_path: local_path.into(),
            previous_local_paths: Vec::new(),
        }
    }

    /// This link with its native ids replaced, remembering a moved path.
    pub fn rebound(&self, remote_id: &str, local_path: &NormalizedPath) -> Self {
        let mut next = self.clone();
        if &next.local_path != local_path {
            let old = std::mem::replace(&mut next.local_path, local_path.clone());
            if !next.previous_local_paths.contains(&old) {
                next.previous_local_paths.push(old);
            }
            next.previous_local_paths.retain(|p| p != local_path);
        }
        next.remote_id = remote_id.to_string();
        next
    }
}

/// Record and link for one pair, persisted as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCommit {
    pub record: SyncRecord,
    pub link: SyncLink,
}

/// Persistence for records, links, conflict artifacts, the decision log,
/// and the reference registry.
///
/// Implementations must serialize writes that address the same stable id;
/// writes for different ids need no coordination.
pub trait StateStore: Send + Sync {
    fn get(&self, stable_id: StableId) -> Result<Option<SyncRecord>>;

    /// Replace the record of an existing pair, keeping its link.
    fn put(&self, record: SyncRecord) -> Result<()>;

    fn list_all(&self) -> Result<Vec<SyncRecord>>;

    /// Bind native ids to a stable id.
    ///
    /// Fails with `IdentityConflict` when either native id already
    /// belongs to another stable id.
    fn create_link(&self, link: SyncLink) -> Result<()>;

    fn find_link_by_remote(&self, remote_id: &str) -> Result<Option<SyncLink>>;

    fn find_link_by_local(&self, local_path: &NormalizedPath) -> Result<Option<SyncLink>>;

    fn list_links(&self) -> Result<Vec<SyncLink>>;

    /// Atomically replace a pair's record and link.
    fn commit(&self, commit: PairCommit) -> Result<()>;

    /// Forget a pair entirely; used once both sides are gone.
    fn remove_pair(&self, stable_id: StableId) -> Result<()>;

    fn list_artifacts(&self) -> Result<Vec<ConflictArtifact>>;

    fn put_artifact(&self, artifact: &ConflictArtifact) -> Result<()>;

    /// The artifact for a pair that has not been applied yet, if any.
    fn open_artifact_for(&self, stable_id: StableId) -> Result<Option<ConflictArtifact>> {
        Ok(self
            .list_artifacts()?
            .into_iter()
            .find(|a| a.stable_id == stable_id && a.applied_at.is_none()))
    }

    fn unresolved_artifact_for(&self, stable_id: StableId) -> Result<Option<ConflictArtifact>> {
        Ok(self.open_artifact_for(stable_id)?.filter(ConflictArtifact::is_unresolved))
    }

    fn append_decision(&self, decision: &DecisionRecord) -> Result<()>;

    /// The decision log, oldest first.
    fn decisions(&self) -> Result<Vec<DecisionRecord>>;

    fn load_references(&self) -> Result<ReferenceRegistry>;

    fn save_references(&self, registry: &ReferenceRegistry) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_to_a_new_path_remembers_the_old_one() {
        let link = SyncLink::new(StableId::generate(), "r1", "notes/a.md");

        let moved = link.rebound("r1", &NormalizedPath::new("notes/b.md"));
        assert_eq!(moved.local_path.as_str(), "notes/b.md");
        assert_eq!(moved.previous_local_paths, vec![NormalizedPath::new("notes/a.md")]);

        let back = moved.rebound("r1", &NormalizedPath::new("notes/a.md"));
        assert_eq!(back.previous_local_paths, vec![NormalizedPath::new("notes/b.md")]);
    }

    #[test]
    fn rebinding_to_the_same_ids_is_a_no_op() {
        let link = SyncLink::new(StableId::generate(), "r1", "a.md");
        assert_eq!(link.rebound("r1", &NormalizedPath::new("a.md")), link);
    }
}
