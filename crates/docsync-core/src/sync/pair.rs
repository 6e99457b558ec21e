//! Stage 2: settle one pair

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use docsync_content::codec::{markdown, remote};
use docsync_content::{Decoded, Document, Fingerprint, StableId};
use docsync_fs::NormalizedPath;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::on_state;
use super::retry::with_retry;
use super::summary::{PairOutcome, PairReport};
use crate::config::SyncConfig;
use crate::conflict::{
    ConflictArtifact, DecisionReason, DecisionRecord, PairState, PairView, SideView, Verdict, adjudicate,
};
use crate::detect::{Side, detect};
use crate::identity::{Binding, IdentityMap, LinkResolver, PendingReference, ReferenceRegistry, Tombstone};
use crate::state::{PairCommit, StateStore, SyncLink, SyncRecord};
use crate::store::{LocalFile, LocalStore, RemoteDocument, RemoteStore};
use crate::{Error, Result};

pub(super) struct RemoteNative {
    pub document: RemoteDocument,
    pub decoded: Decoded,
}

pub(super) struct LocalNative {
    pub file: LocalFile,
    pub decoded: Decoded,
}

/// Everything stage 1 learned about one pair.
pub(super) struct PairJob {
    pub stable_id: StableId,
    pub link: Option<SyncLink>,
    pub record: Option<SyncRecord>,
    pub remote: Option<RemoteNative>,
    pub local: Option<LocalNative>,
    /// Where a note for a remote-only document will be created.
    pub planned_path: Option<NormalizedPath>,
}

/// Shared, read-only view of the cycle for every pair task.
pub(super) struct PairContext {
    pub remote: Arc<dyn RemoteStore>,
    pub local: Arc<dyn LocalStore>,
    pub state: Arc<dyn StateStore>,
    pub config: SyncConfig,
    pub map: IdentityMap,
    pub registry: ReferenceRegistry,
    /// Artifacts not yet applied, by pair.
    pub artifacts: HashMap<StableId, ConflictArtifact>,
    pub shutdown: watch::Receiver<bool>,
}

pub(super) struct PairResult {
    pub report: PairReport,
    pub pending: Vec<PendingReference>,
    pub tombstone: Option<Tombstone>,
}

pub(super) async fn process(job: PairJob, ctx: Arc<PairContext>) -> PairResult {
    let stable_id = job.stable_id;
    let mut pending = Vec::new();
    let resolver = LinkResolver::new(&ctx.map, &ctx.registry);
    let remote_doc = job
        .remote
        .as_ref()
        .map(|n| resolver.inbound(&n.decoded.document, stable_id, &mut pending));
    let local_doc = job
        .local
        .as_ref()
        .map(|n| resolver.inbound(&n.decoded.document, stable_id, &mut pending));

    let mut run = PairRun {
        ctx: &ctx,
        job: &job,
        resolver,
        remote_doc,
        local_doc,
        writes: 0,
        tombstone: None,
    };
    let outcome = match run.settle().await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(%stable_id, error = %e, "pair failed, state left unchanged");
            PairOutcome::Failed { error: e.to_string() }
        }
    };

    let degraded = job.remote.as_ref().is_some_and(|n| n.decoded.is_degraded())
        || job.local.as_ref().is_some_and(|n| n.decoded.is_degraded());
    PairResult {
        report: PairReport {
            stable_id,
            outcome,
            degraded,
            writes: run.writes,
        },
        pending,
        tombstone: run.tombstone,
    }
}

/// Native identities and settled fingerprints after writing a document.
struct Written {
    remote_id: String,
    local_path: NormalizedPath,
    remote_fingerprint: Fingerprint,
    local_fingerprint: Fingerprint,
}

struct PairRun<'a> {
    ctx: &'a PairContext,
    job: &'a PairJob,
    resolver: LinkResolver<'a>,
    remote_doc: Option<Document>,
    local_doc: Option<Document>,
    writes: u32,
    tombstone: Option<Tombstone>,
}

impl PairRun<'_> {
    fn stable_id(&self) -> StableId {
        self.job.stable_id
    }

    fn shutting_down(&self) -> bool {
        *self.ctx.shutdown.borrow()
    }

    async fn settle(&mut self) -> Result<PairOutcome> {
        let (ctx, job) = (self.ctx, self.job);
        let stable_id = self.stable_id();

        if self.remote_doc.is_none() && self.local_doc.is_none() {
            return self.forget().await;
        }

        if let Some(artifact) = ctx.artifacts.get(&stable_id) {
            if artifact.is_unresolved() {
                debug!(%stable_id, artifact = %artifact.id, "pair waits on an unresolved conflict");
                return Ok(PairOutcome::Skipped {
                    reason: format!("conflict {} is unresolved", artifact.id),
                });
            }
            return self.apply_artifact(artifact).await;
        }

        let remote_fp = self.remote_doc.as_ref().map(Document::fingerprint);
        let local_fp = self.local_doc.as_ref().map(Document::fingerprint);
        let record = job.record.as_ref();
        let view = PairView {
            remote: SideView {
                change: detect(Side::Remote, remote_fp.as_ref(), record),
                document: self.remote_doc.as_ref(),
                fingerprint: remote_fp.as_ref(),
            },
            local: SideView {
                change: detect(Side::Local, local_fp.as_ref(), record),
                document: self.local_doc.as_ref(),
                fingerprint: local_fp.as_ref(),
            },
            record,
        };
        let adjudication = adjudicate(&view, ctx.config.sync.policy);
        debug!(
            %stable_id,
            remote = ?view.remote.change,
            local = ?view.local.change,
            state = ?adjudication.state,
            "detected changes"
        );

        let outcome = match adjudication.verdict {
            Verdict::Unchanged => self.keep_link_current().await?,
            Verdict::Propagate { from, document } => {
                if self.shutting_down() {
                    return Ok(shutdown_skip());
                }
                let written = self.write_both(&document).await?;
                self.commit(written).await?;
                info!(%stable_id, from = %from, writes = self.writes, "propagated");
                PairOutcome::Propagated { from }
            }
            Verdict::Converged { document } => {
                if self.shutting_down() {
                    return Ok(shutdown_skip());
                }
                let written = self.write_both(&document).await?;
                self.commit(written).await?;
                debug!(%stable_id, "sides converged");
                PairOutcome::Converged
            }
            Verdict::Delete { deleted } => {
                if self.shutting_down() {
                    return Ok(shutdown_skip());
                }
                self.delete_side(deleted.other()).await?;
                self.forget().await?;
                info!(%stable_id, deleted = %deleted, "deletion propagated");
                PairOutcome::Deleted { side: deleted }
            }
            Verdict::Forget => self.forget().await?,
            Verdict::Conflict => return self.record_conflict().await,
        };

        if let Some(reason) = adjudication.reason {
            self.log_decision(adjudication.state, reason, remote_fp, local_fp).await;
        }
        Ok(outcome)
    }

    /// Nothing changed, but a note may have been renamed.
    async fn keep_link_current(&mut self) -> Result<PairOutcome> {
        let (Some(link), Some(record)) = (&self.job.link, &self.job.record) else {
            return Ok(PairOutcome::Unchanged);
        };
        let remote_id = self
            .job
            .remote
            .as_ref()
            .map_or(link.remote_id.as_str(), |n| n.document.id.as_str());
        let local_path = self.job.local.as_ref().map_or(&link.local_path, |n| &n.file.path);
        let current = link.rebound(remote_id, local_path);
        if &current != link {
            info!(stable_id = %link.stable_id, from = %link.local_path, to = %current.local_path, "note moved");
            let commit = PairCommit {
                record: record.clone(),
                link: current,
            };
            on_state(&self.ctx.state, move |state| state.commit(commit)).await?;
        }
        Ok(PairOutcome::Unchanged)
    }

    /// Write `target` to every side whose content differs from it.
    ///
    /// The remote side goes first so a new page's id is known before the
    /// note is written.
    async fn write_both(&mut self, target: &Document) -> Result<Written> {
        let (ctx, job) = (self.ctx, self.job);
        let stable_id = self.stable_id();
        let target_fp = target.fingerprint();
        let retry = &ctx.config.retry;

        let remote_current = job.remote.as_ref().zip(self.remote_doc.as_ref());
        let (remote_id, remote_fingerprint) = match remote_current {
            Some((native, doc)) if doc.fingerprint() == target_fp && native.decoded.claim == Some(stable_id) => {
                (native.document.id.clone(), target_fp.clone())
            }
            _ => {
                let outbound = self.resolver.outbound(target, Side::Remote);
                let previous = job.remote.as_ref().map(|n| &n.document.page);
                let mut page = remote::encode(&outbound, Some(stable_id), previous);
                if page.title.is_empty() {
                    page.title = self.note_title();
                }

                // A page deleted remotely is recreated under a new id
                let existing = job.remote.as_ref().map(|n| n.document.id.as_str());
                let remote_store: &dyn RemoteStore = ctx.remote.as_ref();
                let page_ref = &page;
                let written_id = with_retry(retry, "write remote document", move || {
                    remote_store.write_document(existing, page_ref)
                })
                .await?;
                self.writes += 1;
                debug!(%stable_id, remote_id = %written_id, "wrote remote document");

                if job.remote.is_none() {
                    // Bind the new page before touching the vault so a failed
                    // local write cannot leave an orphaned page behind.
                    let link = self.link_for(&written_id, &self.local_path());
                    on_state(&ctx.state, move |state| state.create_link(link)).await?;
                }
                let settled = self.settled(&remote::decode(&page));
                (written_id, settled)
            }
        };

        let local_path = self.local_path();
        let local_current = job.local.as_ref().zip(self.local_doc.as_ref());
        let local_fingerprint = match local_current {
            Some((native, doc)) if doc.fingerprint() == target_fp && native.decoded.claim == Some(stable_id) => {
                target_fp.clone()
            }
            _ => {
                let outbound = self.resolver.outbound(target, Side::Local);
                let text = markdown::encode(&outbound, Some(stable_id));
                let local_store: &dyn LocalStore = ctx.local.as_ref();
                let (path_ref, text_ref) = (&local_path, text.as_str());
                with_retry(retry, "write local note", move || local_store.write_file(path_ref, text_ref)).await?;
                self.writes += 1;
                debug!(%stable_id, path = %local_path, "wrote local note");
                self.settled(&markdown::decode(&text))
            }
        };

        Ok(Written {
            remote_id,
            local_path,
            remote_fingerprint,
            local_fingerprint,
        })
    }

    /// Fingerprint of what was just written, as the next cycle will see it.
    fn settled(&self, decoded: &Decoded) -> Fingerprint {
        self.resolver
            .inbound(&decoded.document, self.stable_id(), &mut Vec::new())
            .fingerprint()
    }

    fn local_path(&self) -> NormalizedPath {
        if let Some(native) = &self.job.local {
            return native.file.path.clone();
        }
        if let Some(link) = &self.job.link {
            return link.local_path.clone();
        }
        self.job.planned_path.clone().unwrap_or_else(|| {
            NormalizedPath::new(format!("{}.{}", self.stable_id(), self.ctx.config.local.extension))
        })
    }

    fn note_title(&self) -> String {
        self.local_path()
            .file_stem()
            .map(str::to_string)
            .unwrap_or_else(|| "Untitled".to_string())
    }

    fn link_for(&self, remote_id: &str, local_path: &NormalizedPath) -> SyncLink {
        match &self.job.link {
            Some(link) => link.rebound(remote_id, local_path),
            None => SyncLink::new(self.stable_id(), remote_id, local_path.clone()),
        }
    }

    async fn commit(&self, written: Written) -> Result<()> {
        let sync_version = match &self.job.record {
            Some(record) if self.writes == 0 => record.sync_version,
            Some(record) => record.sync_version + 1,
            None => 1,
        };
        let commit = PairCommit {
            record: SyncRecord {
                stable_id: self.stable_id(),
                last_remote_fingerprint: written.remote_fingerprint,
                last_local_fingerprint: written.local_fingerprint,
                last_synced_at: Utc::now(),
                sync_version,
            },
            link: self.link_for(&written.remote_id, &written.local_path),
        };
        on_state(&self.ctx.state, move |state| state.commit(commit)).await
    }

    async fn delete_side(&mut self, side: Side) -> Result<()> {
        let (ctx, job) = (self.ctx, self.job);
        let retry = &ctx.config.retry;
        match side {
            Side::Remote => {
                if let Some(native) = &job.remote {
                    let remote_store: &dyn RemoteStore = ctx.remote.as_ref();
                    let id = native.document.id.as_str();
                    with_retry(retry, "delete remote document", move || remote_store.delete_document(id)).await?;
                    self.writes += 1;
                }
            }
            Side::Local => {
                if let Some(native) = &job.local {
                    let local_store: &dyn LocalStore = ctx.local.as_ref();
                    let path = &native.file.path;
                    with_retry(retry, "delete local note", move || local_store.delete_file(path)).await?;
                    self.writes += 1;
                }
            }
        }
        Ok(())
    }

    /// Drop the pair's state and remember its names as a tombstone.
    async fn forget(&mut self) -> Result<PairOutcome> {
        let stable_id = self.stable_id();
        let binding = match &self.job.link {
            Some(link) => Binding::from(link),
            None => self
                .ctx
                .map
                .binding(stable_id)
                .cloned()
                .unwrap_or_else(|| Binding::new(stable_id)),
        };
        on_state(&self.ctx.state, move |state| state.remove_pair(stable_id)).await?;
        self.tombstone = Some(Tombstone::for_binding(&binding, Utc::now()));
        debug!(%stable_id, "pair forgotten");
        Ok(PairOutcome::Forgotten)
    }

    async fn record_conflict(&self) -> Result<PairOutcome> {
        let stable_id = self.stable_id();
        let (Some(remote_doc), Some(local_doc)) = (&self.remote_doc, &self.local_doc) else {
            return Err(Error::state(format!("conflict on {stable_id} without both sides")));
        };
        let artifact = ConflictArtifact::new(stable_id, remote_doc, local_doc);
        let artifact_id = artifact.id;
        on_state(&self.ctx.state, move |state| state.put_artifact(&artifact)).await?;
        warn!(%stable_id, artifact = %artifact_id, "conflicting edits recorded for manual resolution");
        Ok(PairOutcome::Conflicted { artifact_id })
    }

    async fn apply_artifact(&mut self, artifact: &ConflictArtifact) -> Result<PairOutcome> {
        let stable_id = self.stable_id();
        let Some(document) = artifact.chosen().cloned() else {
            return Ok(PairOutcome::Skipped {
                reason: format!("conflict {} has no chosen content", artifact.id),
            });
        };
        if self.shutting_down() {
            return Ok(shutdown_skip());
        }

        let written = self.write_both(&document).await?;
        let (remote_fp, local_fp) = (written.remote_fingerprint.clone(), written.local_fingerprint.clone());
        self.commit(written).await?;

        let mut applied = artifact.clone();
        applied.applied_at = Some(Utc::now());
        let reason = DecisionReason::ArtifactApplied {
            artifact_id: applied.id,
            status: applied.status,
        };
        on_state(&self.ctx.state, move |state| state.put_artifact(&applied)).await?;
        info!(%stable_id, artifact = %artifact.id, status = %artifact.status, "applied resolved conflict");
        self.log_decision(PairState::Both, reason, Some(remote_fp), Some(local_fp)).await;
        Ok(PairOutcome::Resolved {
            artifact_id: artifact.id,
        })
    }

    /// Decisions are written after the pair committed; a failure here is
    /// reported but does not undo the sync.
    async fn log_decision(
        &self,
        state: PairState,
        reason: DecisionReason,
        remote_fingerprint: Option<Fingerprint>,
        local_fingerprint: Option<Fingerprint>,
    ) {
        let stable_id = self.stable_id();
        info!(%stable_id, %reason, "decision");
        let decision = DecisionRecord {
            at: Utc::now(),
            stable_id,
            state,
            reason,
            remote_fingerprint,
            local_fingerprint,
        };
        if let Err(e) = on_state(&self.ctx.state, move |store| store.append_decision(&decision)).await {
            error!(%stable_id, error = %e, "failed to append decision record");
        }
    }
}

fn shutdown_skip() -> PairOutcome {
    PairOutcome::Skipped {
        reason: "shutting down".to_string(),
    }
}
