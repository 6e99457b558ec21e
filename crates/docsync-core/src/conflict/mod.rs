//! Conflict adjudication
//!
//! Each pair goes through `NoChange -> {RemoteOnly, LocalOnly, Both}`.
//! One-sided changes propagate; `Both` first looks for a side that only
//! added content, then falls back to the configured [`Policy`].

mod artifact;

pub use artifact::{ArtifactStatus, ConflictArtifact, DecisionRecord, ResolutionChoice, resolve_artifact};

use std::fmt;
use std::str::FromStr;

use docsync_content::{Document, Fingerprint};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detect::{ChangeKind, Side};
use crate::state::SyncRecord;

/// What to do when both sides diverged and neither is a superset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    PreferRemote,
    PreferLocal,
    /// Record a [`ConflictArtifact`] and leave both sides alone.
    #[default]
    Manual,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreferRemote => "prefer-remote",
            Self::PreferLocal => "prefer-local",
            Self::Manual => "manual",
        })
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prefer-remote" | "remote" => Ok(Self::PreferRemote),
            "prefer-local" | "local" => Ok(Self::PreferLocal),
            "manual" => Ok(Self::Manual),
            other => Err(format!(
                "unknown policy '{other}' (expected prefer-remote, prefer-local or manual)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PairState {
    NoChange,
    RemoteOnly,
    LocalOnly,
    Both,
}

impl PairState {
    pub fn from_changes(remote: ChangeKind, local: ChangeKind) -> Self {
        match (remote.is_change(), local.is_change()) {
            (false, false) => Self::NoChange,
            (true, false) => Self::RemoteOnly,
            (false, true) => Self::LocalOnly,
            (true, true) => Self::Both,
        }
    }
}

/// Why a `Both` pair was settled the way it was; logged as a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum DecisionReason {
    /// One side only added blocks to the other.
    Superset { side: Side },
    Policy { policy: Policy, side: Side },
    /// One side was deleted while the other was edited; the edit survives.
    DeletedVsEdited { kept: Side },
    /// An externally resolved artifact was written to both sides.
    ArtifactApplied { artifact_id: Uuid, status: ArtifactStatus },
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Superset { side } => write!(f, "{side} is a superset, took {side}"),
            Self::Policy { policy, side } => write!(f, "policy {policy}, took {side}"),
            Self::DeletedVsEdited { kept } => write!(f, "{} deleted but {kept} edited, kept {kept}", kept.other()),
            Self::ArtifactApplied { artifact_id, status } => write!(f, "artifact {artifact_id} applied ({status})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Unchanged,
    /// Write `document` to both sides.
    Propagate { from: Side, document: Document },
    /// Both sides already agree.
    Converged { document: Document },
    /// `deleted` is gone; remove the other side too.
    Delete { deleted: Side },
    /// Both sides are gone; drop the pair.
    Forget,
    /// Needs an external decision.
    Conflict,
}

/// One side of a pair as seen this cycle, links already resolved.
#[derive(Debug, Clone, Copy)]
pub struct SideView<'a> {
    pub change: ChangeKind,
    pub document: Option<&'a Document>,
    pub fingerprint: Option<&'a Fingerprint>,
}

#[derive(Debug, Clone, Copy)]
pub struct PairView<'a> {
    pub remote: SideView<'a>,
    pub local: SideView<'a>,
    pub record: Option<&'a SyncRecord>,
}

impl<'a> PairView<'a> {
    pub fn side(&self, side: Side) -> &SideView<'a> {
        match side {
            Side::Remote => &self.remote,
            Side::Local => &self.local,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Adjudication {
    pub state: PairState,
    pub verdict: Verdict,
    /// Present for every `Both` outcome that picked content.
    pub reason: Option<DecisionReason>,
}

pub fn adjudicate(view: &PairView<'_>, policy: Policy) -> Adjudication {
    let state = PairState::from_changes(view.remote.change, view.local.change);
    let (verdict, reason) = match state {
        PairState::NoChange => (Verdict::Unchanged, None),
        PairState::RemoteOnly => (one_sided(view, Side::Remote), None),
        PairState::LocalOnly => (one_sided(view, Side::Local), None),
        PairState::Both => both_changed(view, policy),
    };
    tracing::debug!(?state, ?reason, "adjudicated pair");
    Adjudication { state, verdict, reason }
}

fn one_sided(view: &PairView<'_>, side: Side) -> Verdict {
    let changed = view.side(side);
    match (changed.change, changed.document) {
        (ChangeKind::Deleted, _) if view.side(side.other()).document.is_some() => Verdict::Delete { deleted: side },
        (ChangeKind::Deleted, _) => Verdict::Forget,
        (_, Some(document)) => Verdict::Propagate {
            from: side,
            document: document.clone(),
        },
        (_, None) => Verdict::Unchanged,
    }
}

fn both_changed(view: &PairView<'_>, policy: Policy) -> (Verdict, Option<DecisionReason>) {
    let (remote, local) = match (view.remote.document, view.local.document) {
        (None, None) => return (Verdict::Forget, None),
        (Some(document), None) | (None, Some(document)) => {
            let kept = if view.remote.document.is_some() { Side::Remote } else { Side::Local };
            let verdict = Verdict::Propagate {
                from: kept,
                document: document.clone(),
            };
            return (verdict, Some(DecisionReason::DeletedVsEdited { kept }));
        }
        (Some(remote), Some(local)) => (remote, local),
    };

    if view.remote.fingerprint == view.local.fingerprint {
        return (Verdict::Converged { document: remote.clone() }, None);
    }

    // A side that now matches what the other side last synced has only
    // been reverted to the common base.
    if let Some(record) = view.record {
        if view.remote.fingerprint == Some(&record.last_local_fingerprint) {
            return one_side_wins(Side::Local, local);
        }
        if view.local.fingerprint == Some(&record.last_remote_fingerprint) {
            return one_side_wins(Side::Remote, remote);
        }
    }

    // A superset only wins when no property value would be overwritten.
    if remote.properties.agrees_with(&local.properties) {
        if remote.tree.is_superset_of(&local.tree) {
            return superset(Side::Remote, remote, local);
        }
        if local.tree.is_superset_of(&remote.tree) {
            return superset(Side::Local, local, remote);
        }
    }

    let side = match policy {
        Policy::PreferRemote => Side::Remote,
        Policy::PreferLocal => Side::Local,
        Policy::Manual => return (Verdict::Conflict, None),
    };
    let document = if side == Side::Remote { remote } else { local };
    (
        Verdict::Propagate {
            from: side,
            document: document.clone(),
        },
        Some(DecisionReason::Policy { policy, side }),
    )
}

fn one_side_wins(side: Side, document: &Document) -> (Verdict, Option<DecisionReason>) {
    let verdict = Verdict::Propagate {
        from: side,
        document: document.clone(),
    };
    (verdict, None)
}

fn superset(side: Side, larger: &Document, smaller: &Document) -> (Verdict, Option<DecisionReason>) {
    let document = Document::new(larger.tree.clone(), larger.properties.union(&smaller.properties));
    (
        Verdict::Propagate { from: side, document },
        Some(DecisionReason::Superset { side }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docsync_content::{Block, ContentTree, PropertySet, PropertyValue, StableId};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn doc(paragraphs: &[&str]) -> Document {
        Document::new(
            ContentTree::new(paragraphs.iter().map(|p| Block::paragraph(*p)).collect()),
            PropertySet::new(),
        )
    }

    fn record_of(base: &Document) -> SyncRecord {
        SyncRecord {
            stable_id: StableId::generate(),
            last_remote_fingerprint: base.fingerprint(),
            last_local_fingerprint: base.fingerprint(),
            last_synced_at: Utc::now(),
            sync_version: 1,
        }
    }

    struct Case {
        remote: Option<Document>,
        local: Option<Document>,
        record: Option<SyncRecord>,
    }

    impl Case {
        fn run(&self, policy: Policy) -> Adjudication {
            let remote_fp = self.remote.as_ref().map(Document::fingerprint);
            let local_fp = self.local.as_ref().map(Document::fingerprint);
            let view = PairView {
                remote: SideView {
                    change: crate::detect::detect(Side::Remote, remote_fp.as_ref(), self.record.as_ref()),
                    document: self.remote.as_ref(),
                    fingerprint: remote_fp.as_ref(),
                },
                local: SideView {
                    change: crate::detect::detect(Side::Local, local_fp.as_ref(), self.record.as_ref()),
                    document: self.local.as_ref(),
                    fingerprint: local_fp.as_ref(),
                },
                record: self.record.as_ref(),
            };
            adjudicate(&view, policy)
        }
    }

    #[test]
    fn new_remote_document_propagates() {
        let case = Case {
            remote: Some(doc(&["Hello"])),
            local: None,
            record: None,
        };
        let result = case.run(Policy::Manual);
        assert_eq!(result.state, PairState::RemoteOnly);
        assert_eq!(
            result.verdict,
            Verdict::Propagate {
                from: Side::Remote,
                document: doc(&["Hello"])
            }
        );
        assert_eq!(result.reason, None);
    }

    #[test]
    fn local_deletion_deletes_remote() {
        let base = doc(&["a"]);
        let case = Case {
            remote: Some(base.clone()),
            local: None,
            record: Some(record_of(&base)),
        };
        let result = case.run(Policy::Manual);
        assert_eq!(result.state, PairState::LocalOnly);
        assert_eq!(result.verdict, Verdict::Delete { deleted: Side::Local });
    }

    #[test]
    fn both_deleted_forgets_the_pair() {
        let base = doc(&["a"]);
        let case = Case {
            remote: None,
            local: None,
            record: Some(record_of(&base)),
        };
        assert_eq!(case.run(Policy::PreferRemote).verdict, Verdict::Forget);
    }

    #[test]
    fn edit_beats_deletion() {
        let base = doc(&["a"]);
        let case = Case {
            remote: None,
            local: Some(doc(&["a", "b"])),
            record: Some(record_of(&base)),
        };
        let result = case.run(Policy::PreferRemote);
        assert_eq!(result.state, PairState::Both);
        assert_eq!(
            result.verdict,
            Verdict::Propagate {
                from: Side::Local,
                document: doc(&["a", "b"])
            }
        );
        assert_eq!(result.reason, Some(DecisionReason::DeletedVsEdited { kept: Side::Local }));
    }

    #[test]
    fn identical_edits_converge() {
        let base = doc(&["a"]);
        let case = Case {
            remote: Some(doc(&["b"])),
            local: Some(doc(&["b"])),
            record: Some(record_of(&base)),
        };
        let result = case.run(Policy::Manual);
        assert_eq!(result.verdict, Verdict::Converged { document: doc(&["b"]) });
        assert_eq!(result.reason, None);
    }

    #[test]
    fn superset_side_wins_with_merged_properties() {
        let base = doc(&["a"]);
        let mut remote = doc(&["a", "added remotely"]);
        remote.properties.insert("status", PropertyValue::text("draft"));
        let mut local = doc(&["a"]);
        local.properties.insert("status", PropertyValue::text("draft"));
        local.properties.insert("owner", PropertyValue::text("sam"));

        let case = Case {
            remote: Some(remote),
            local: Some(local),
            record: Some(record_of(&base)),
        };
        let result = case.run(Policy::Manual);

        let Verdict::Propagate { from, document } = result.verdict else {
            panic!("expected propagation, got {:?}", result.verdict);
        };
        assert_eq!(from, Side::Remote);
        assert_eq!(document.tree, doc(&["a", "added remotely"]).tree);
        assert_eq!(document.properties.get("status"), Some(&PropertyValue::text("draft")));
        assert_eq!(document.properties.get("owner"), Some(&PropertyValue::text("sam")));
        assert_eq!(result.reason, Some(DecisionReason::Superset { side: Side::Remote }));
    }

    #[rstest]
    #[case::smaller_side_edited_a_property(&["a"], &["a", "b"])]
    #[case::same_body_different_properties(&["a", "b"], &["a", "b"])]
    fn superset_never_overwrites_a_property_edit(#[case] remote_body: &[&str], #[case] local_body: &[&str]) {
        let mut base = doc(&["a"]);
        base.properties.insert("status", PropertyValue::text("draft"));
        let mut remote = doc(remote_body);
        remote.properties.insert("status", PropertyValue::text("done"));
        let mut local = doc(local_body);
        local.properties.insert("status", PropertyValue::text("draft"));
        local.properties.insert("reviewed", PropertyValue::Bool(true));

        let case = Case {
            remote: Some(remote),
            local: Some(local),
            record: Some(record_of(&base)),
        };
        let result = case.run(Policy::Manual);
        assert_eq!(result.verdict, Verdict::Conflict);
        assert_eq!(result.reason, None);

        let result = case.run(Policy::PreferLocal);
        assert_eq!(
            result.reason,
            Some(DecisionReason::Policy {
                policy: Policy::PreferLocal,
                side: Side::Local
            })
        );
    }

    #[rstest]
    #[case(Policy::PreferRemote, Some(Side::Remote))]
    #[case(Policy::PreferLocal, Some(Side::Local))]
    #[case(Policy::Manual, None)]
    fn divergent_edits_follow_policy(#[case] policy: Policy, #[case] winner: Option<Side>) {
        let base = doc(&["a", "b"]);
        let case = Case {
            remote: Some(doc(&["a", "remote"])),
            local: Some(doc(&["local", "b"])),
            record: Some(record_of(&base)),
        };
        let result = case.run(policy);

        match winner {
            Some(side) => {
                assert!(matches!(result.verdict, Verdict::Propagate { from, .. } if from == side));
                assert_eq!(result.reason, Some(DecisionReason::Policy { policy, side }));
            }
            None => {
                assert_eq!(result.verdict, Verdict::Conflict);
                assert_eq!(result.reason, None);
            }
        }
    }

    #[test]
    fn first_sync_of_two_different_documents_is_a_conflict_under_manual() {
        let case = Case {
            remote: Some(doc(&["remote"])),
            local: Some(doc(&["local"])),
            record: None,
        };
        let result = case.run(Policy::Manual);
        assert_eq!(result.state, PairState::Both);
        assert_eq!(result.verdict, Verdict::Conflict);
    }

    #[test]
    fn policy_parses_from_config_spelling() {
        assert_eq!("prefer-local".parse::<Policy>(), Ok(Policy::PreferLocal));
        assert_eq!("Manual".parse::<Policy>(), Ok(Policy::Manual));
        assert!("newest".parse::<Policy>().is_err());
    }
}
