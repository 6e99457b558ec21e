//! Change detection by fingerprint comparison

use std::fmt;

use docsync_content::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::state::SyncRecord;

/// One of the two stores being kept in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Remote,
    Local,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Self::Remote => Self::Local,
            Self::Local => Self::Remote,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Local => "local",
        })
    }
}

/// What happened to one side of a pair since it was last synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    None,
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn is_change(self) -> bool {
        self != Self::None
    }
}

/// Classify one side of a pair.
///
/// `current` is the fingerprint of the side's document as it exists now
/// (`None` when the document is absent). Only exact fingerprint equality
/// counts as unchanged; timestamps are never consulted.
pub fn detect(side: Side, current: Option<&Fingerprint>, record: Option<&SyncRecord>) -> ChangeKind {
    match (current, record) {
        (None, None) => ChangeKind::None,
        (Some(_), None) => ChangeKind::Created,
        (None, Some(_)) => ChangeKind::Deleted,
        (Some(now), Some(record)) if now == record.last_fingerprint(side) => ChangeKind::None,
        (Some(_), Some(_)) => ChangeKind::Updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docsync_content::{Block, ContentTree, Document, PropertySet, StableId};
    use rstest::rstest;

    fn fingerprint(text: &str) -> Fingerprint {
        Document::new(ContentTree::new(vec![Block::paragraph(text)]), PropertySet::new()).fingerprint()
    }

    fn record() -> SyncRecord {
        SyncRecord {
            stable_id: StableId::generate(),
            last_remote_fingerprint: fingerprint("remote"),
            last_local_fingerprint: fingerprint("local"),
            last_synced_at: Utc::now(),
            sync_version: 1,
        }
    }

    #[rstest]
    #[case::absent_everywhere(None, false, ChangeKind::None)]
    #[case::new_document(Some("remote"), false, ChangeKind::Created)]
    #[case::gone(None, true, ChangeKind::Deleted)]
    #[case::same(Some("remote"), true, ChangeKind::None)]
    #[case::edited(Some("edited"), true, ChangeKind::Updated)]
    fn classifies_remote_side(#[case] current: Option<&str>, #[case] has_record: bool, #[case] expected: ChangeKind) {
        let record = has_record.then(record);
        let current = current.map(fingerprint);
        assert_eq!(detect(Side::Remote, current.as_ref(), record.as_ref()), expected);
    }

    #[test]
    fn compares_against_the_matching_side() {
        let record = record();
        let local_now = fingerprint("local");
        assert_eq!(detect(Side::Local, Some(&local_now), Some(&record)), ChangeKind::None);
        assert_eq!(detect(Side::Remote, Some(&local_now), Some(&record)), ChangeKind::Updated);
    }
}
