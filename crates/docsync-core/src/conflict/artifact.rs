//! Conflict artifacts and the decision log

use std::fmt;

use chrono::{DateTime, Utc};
use docsync_content::{Document, DocumentDiff, Fingerprint, StableId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DecisionReason, PairState};
use crate::state::StateStore;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactStatus {
    Unresolved,
    ResolvedRemote,
    ResolvedLocal,
    ResolvedMerged,
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unresolved => "unresolved",
            Self::ResolvedRemote => "resolved-remote",
            Self::ResolvedLocal => "resolved-local",
            Self::ResolvedMerged => "resolved-merged",
        })
    }
}

/// A divergence the engine would not settle on its own.
///
/// Created `unresolved`; an external actor picks the content with
/// [`ConflictArtifact::resolve`], the next cycle writes it to both sides
/// and stamps `applied_at`, after which the artifact is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictArtifact {
    pub id: Uuid,
    pub stable_id: StableId,
    pub created_at: DateTime<Utc>,
    pub remote: Document,
    pub local: Document,
    pub remote_fingerprint: Fingerprint,
    pub local_fingerprint: Fingerprint,
    /// Unified diff of the two markdown renderings.
    #[serde(default)]
    pub diff: String,
    pub status: ArtifactStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
}

impl ConflictArtifact {
    pub fn new(stable_id: StableId, remote: &Document, local: &Document) -> Self {
        Self {
            id: Uuid::new_v4(),
            stable_id,
            created_at: Utc::now(),
            remote: remote.clone(),
            local: local.clone(),
            remote_fingerprint: remote.fingerprint(),
            local_fingerprint: local.fingerprint(),
            diff: DocumentDiff::between("remote", remote, "local", local).unified,
            status: ArtifactStatus::Unresolved,
            resolution: None,
            resolved_at: None,
            applied_at: None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        self.status == ArtifactStatus::Unresolved
    }

    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }

    /// Record the external decision. May be repeated until applied.
    pub fn resolve(&mut self, choice: ResolutionChoice) -> Result<()> {
        if self.is_applied() {
            return Err(Error::ArtifactApplied { id: self.id.to_string() });
        }
        let (status, document) = match choice {
            ResolutionChoice::Remote => (ArtifactStatus::ResolvedRemote, self.remote.clone()),
            ResolutionChoice::Local => (ArtifactStatus::ResolvedLocal, self.local.clone()),
            ResolutionChoice::Merged(document) => (ArtifactStatus::ResolvedMerged, document),
        };
        self.status = status;
        self.resolution = Some(document);
        self.resolved_at = Some(Utc::now());
        Ok(())
    }

    /// The document to write once resolved.
    pub fn chosen(&self) -> Option<&Document> {
        match self.status {
            ArtifactStatus::Unresolved => None,
            ArtifactStatus::ResolvedRemote => Some(self.resolution.as_ref().unwrap_or(&self.remote)),
            ArtifactStatus::ResolvedLocal => Some(self.resolution.as_ref().unwrap_or(&self.local)),
            ArtifactStatus::ResolvedMerged => self.resolution.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionChoice {
    Remote,
    Local,
    Merged(Document),
}

/// Mark an artifact resolved in the state store.
///
/// `artifact_id` may be any unique prefix of the id.
pub fn resolve_artifact(state: &dyn StateStore, artifact_id: &str, choice: ResolutionChoice) -> Result<ConflictArtifact> {
    let needle = artifact_id.trim().to_ascii_lowercase();
    let mut matches: Vec<ConflictArtifact> = state
        .list_artifacts()?
        .into_iter()
        .filter(|a| !needle.is_empty() && a.id.to_string().starts_with(&needle))
        .collect();
    if matches.len() != 1 {
        return Err(Error::ArtifactNotFound {
            id: artifact_id.to_string(),
        });
    }
    let mut artifact = matches.remove(0);
    artifact.resolve(choice)?;
    state.put_artifact(&artifact)?;
    tracing::info!(artifact = %artifact.id, stable_id = %artifact.stable_id, status = %artifact.status, "conflict resolved");
    Ok(artifact)
}

/// One entry of the append-only decision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub at: DateTime<Utc>,
    pub stable_id: StableId,
    pub state: PairState,
    #[serde(flatten)]
    pub reason: DecisionReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_fingerprint: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_fingerprint: Option<Fingerprint>,
}

impl fmt::Display for DecisionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:?}: {}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.stable_id,
            self.state,
            self.reason
        )
    }
}
