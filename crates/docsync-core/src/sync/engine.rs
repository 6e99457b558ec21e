//! SyncEngine implementation
//!
//! The engine owns the stores and the state, runs one cycle at a time,
//! and reports every pair's outcome in a [`CycleSummary`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use docsync_content::codec::{markdown, remote};
use docsync_content::StableId;
use docsync_fs::NormalizedPath;
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::on_state;
use super::pair::{self, LocalNative, PairContext, PairJob, PairResult, RemoteNative};
use super::retry::with_retry;
use super::summary::{CycleSummary, PairOutcome, PairReport};
use crate::config::SyncConfig;
use crate::conflict::ConflictArtifact;
use crate::identity::{Binding, IdentityMap, Tombstone};
use crate::state::{StateStore, SyncLink, SyncRecord};
use crate::store::{LocalStore, RemoteStore};
use crate::{Error, Result};

/// Drives sync cycles between one remote store and one vault.
pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    local: Arc<dyn LocalStore>,
    state: Arc<dyn StateStore>,
    config: SyncConfig,
    cycle_lock: Mutex<()>,
    shutdown: watch::Receiver<bool>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        local: Arc<dyn LocalStore>,
        state: Arc<dyn StateStore>,
        config: SyncConfig,
    ) -> Self {
        let (_, shutdown) = watch::channel(false);
        Self {
            remote,
            local,
            state,
            config,
            cycle_lock: Mutex::new(()),
            shutdown,
        }
    }

    /// Stop starting new writes once `shutdown` turns true. Pairs that
    /// already started writing finish and commit.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<dyn StateStore> {
        &self.state
    }

    /// Run one full cycle.
    ///
    /// Returns [`Error::CycleInProgress`] at once if another cycle is
    /// running. Listing or state store failures abort the cycle; failures
    /// of a single pair are reported in the summary.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let _running = self.cycle_lock.try_lock().map_err(|_| Error::CycleInProgress)?;
        let mut summary = CycleSummary::new(Uuid::new_v4(), Utc::now());
        info!(cycle_id = %summary.cycle_id, "sync cycle started");

        let (jobs, context, early) = self.prepare().await?;
        for report in early {
            summary.record(report);
        }

        let context = Arc::new(context);
        let results = self.execute(jobs, Arc::clone(&context)).await;

        let mut registry = context.registry.clone();
        let mut pending = Vec::new();
        for result in results {
            pending.extend(result.pending);
            if let Some(tombstone) = result.tombstone {
                registry.bury(tombstone);
            }
            summary.record(result.report);
        }
        if let Some(cutoff) = self.config.state.tombstone_cutoff(Utc::now()) {
            let pruned = registry.prune_tombstones(cutoff);
            if pruned > 0 {
                debug!(pruned, "dropped expired tombstones");
            }
        }
        registry.refresh_pending(pending);
        summary.unresolved_links = registry.pending.len();
        on_state(&self.state, move |state| state.save_references(&registry)).await?;

        summary.outcomes.sort_by_key(|r| r.stable_id);
        summary.finished_at = Utc::now();
        info!(cycle_id = %summary.cycle_id, %summary, "sync cycle finished");
        Ok(summary)
    }

    /// Stage 1: list, decode and assign every native document to a pair.
    async fn prepare(&self) -> Result<(Vec<PairJob>, PairContext, Vec<PairReport>)> {
        let retry = &self.config.retry;
        let remote_store: &dyn RemoteStore = self.remote.as_ref();
        let local_store: &dyn LocalStore = self.local.as_ref();
        let (remote_docs, local_files) = tokio::try_join!(
            with_retry(retry, "list remote documents", move || remote_store.list_documents()),
            with_retry(retry, "list local notes", move || local_store.list_files()),
        )?;

        let (links, records, artifacts, registry) = on_state(&self.state, |state| {
            Ok((
                state.list_links()?,
                state.list_all()?,
                state.list_artifacts()?,
                state.load_references()?,
            ))
        })
        .await?;

        let (remote, local) = tokio::try_join!(
            tokio::task::spawn_blocking(move || {
                remote_docs
                    .into_iter()
                    .map(|document| {
                        let decoded = remote::decode(&document.page);
                        RemoteNative { document, decoded }
                    })
                    .collect::<Vec<_>>()
            }),
            tokio::task::spawn_blocking(move || {
                local_files
                    .into_iter()
                    .map(|file| {
                        let decoded = markdown::decode(&file.text);
                        LocalNative { file, decoded }
                    })
                    .collect::<Vec<_>>()
            }),
        )?;
        debug!(remote = remote.len(), local = local.len(), links = links.len(), "listed both stores");

        for native in &remote {
            for note in &native.decoded.notes {
                warn!(remote_id = %native.document.id, %note, "remote conversion degraded");
            }
        }
        for native in &local {
            for note in &native.decoded.notes {
                warn!(path = %native.file.path, %note, "local conversion degraded");
            }
        }

        let mut slots = assign(links, records, remote, local);
        plan_local_paths(&mut slots, &self.config.local.extension);

        let mut early = Vec::new();
        let mut jobs = Vec::new();
        let mut bindings = Vec::new();
        let mut registry = registry;
        for (stable_id, slot) in slots {
            if let Some(error) = slot.identity_conflict() {
                error!(%stable_id, %error, "identity conflict needs manual correction");
                bindings.extend(slot.link.as_ref().map(Binding::from));
                early.push(PairReport::new(stable_id, PairOutcome::Failed { error: error.to_string() }));
                continue;
            }
            let job = slot.into_job(stable_id);
            let binding = job.binding();
            if job.remote.is_none() && job.local.is_none() {
                // Gone on both sides: references to it are already broken.
                registry.bury(Tombstone::for_binding(&binding, Utc::now()));
            } else {
                registry.revive(stable_id);
                bindings.push(binding);
            }
            jobs.push(job);
        }

        let artifacts: HashMap<StableId, ConflictArtifact> = artifacts
            .into_iter()
            .filter(|a| !a.is_applied())
            .map(|a| (a.stable_id, a))
            .collect();

        let context = PairContext {
            remote: Arc::clone(&self.remote),
            local: Arc::clone(&self.local),
            state: Arc::clone(&self.state),
            config: self.config.clone(),
            map: IdentityMap::new(bindings),
            registry,
            artifacts,
            shutdown: self.shutdown.clone(),
        };
        Ok((jobs, context, early))
    }

    /// Stage 2: settle pairs concurrently, bounded by `max_concurrency`.
    async fn execute(&self, jobs: Vec<PairJob>, context: Arc<PairContext>) -> Vec<PairResult> {
        let limit = Arc::new(Semaphore::new(self.config.sync.max_concurrency.max(1)));
        let mut tasks = DetachOnDrop(JoinSet::new());
        let mut ids = HashMap::new();

        for job in jobs {
            let stable_id = job.stable_id;
            let limit = Arc::clone(&limit);
            let context = Arc::clone(&context);
            let handle = tasks.0.spawn(async move {
                let _permit = limit.acquire_owned().await;
                pair::process(job, context).await
            });
            ids.insert(handle.id(), stable_id);
        }

        let mut results = Vec::with_capacity(ids.len());
        while let Some(joined) = tasks.0.join_next_with_id().await {
            match joined {
                Ok((_, result)) => results.push(result),
                Err(e) => {
                    let stable_id = ids.get(&e.id()).copied();
                    error!(?stable_id, error = %e, "pair task panicked");
                    if let Some(stable_id) = stable_id {
                        results.push(PairResult {
                            report: PairReport::new(stable_id, PairOutcome::Failed { error: e.to_string() }),
                            pending: Vec::new(),
                            tombstone: None,
                        });
                    }
                }
            }
        }
        results
    }
}

/// Lets running pair tasks finish if the cycle future is dropped, instead
/// of aborting them between a native write and its commit.
struct DetachOnDrop<T: 'static>(JoinSet<T>);

impl<T: 'static> Drop for DetachOnDrop<T> {
    fn drop(&mut self) {
        self.0.detach_all();
    }
}

/// Natives and state gathered for one stable id during stage 1.
#[derive(Default)]
struct Slot {
    link: Option<SyncLink>,
    record: Option<SyncRecord>,
    remote: Vec<RemoteNative>,
    local: Vec<LocalNative>,
    planned_path: Option<NormalizedPath>,
}

impl Slot {
    fn identity_conflict(&self) -> Option<Error> {
        if self.remote.len() <= 1 && self.local.len() <= 1 {
            return None;
        }
        let stable_id = self
            .link
            .as_ref()
            .map(|l| l.stable_id)
            .or_else(|| self.remote.first().and_then(|n| n.decoded.claim))
            .or_else(|| self.local.first().and_then(|n| n.decoded.claim))?;
        let mut claimants: Vec<String> = self.remote.iter().map(|n| format!("remote:{}", n.document.id)).collect();
        claimants.extend(self.local.iter().map(|n| format!("local:{}", n.file.path)));
        Some(Error::IdentityConflict { stable_id, claimants })
    }

    fn into_job(self, stable_id: StableId) -> PairJob {
        PairJob {
            stable_id,
            link: self.link,
            record: self.record,
            remote: self.remote.into_iter().next(),
            local: self.local.into_iter().next(),
            planned_path: self.planned_path,
        }
    }
}

impl PairJob {
    /// Native ids this pair will have once this cycle's writes land.
    fn binding(&self) -> Binding {
        let mut binding = match &self.link {
            Some(link) => Binding::from(link),
            None => Binding::new(self.stable_id),
        };
        if let Some(native) = &self.remote {
            binding.remote_id = Some(native.document.id.clone());
        }
        if let Some(path) = self
            .local
            .as_ref()
            .map(|n| n.file.path.clone())
            .or_else(|| self.planned_path.clone())
        {
            if binding.local_path.as_ref().is_some_and(|p| p != &path) {
                if let Some(old) = binding.local_path.take() {
                    binding.previous_local_paths.push(old);
                }
            }
            binding.local_path = Some(path);
        }
        binding
    }
}

/// Map every native document to a stable id.
///
/// Remote pages are matched by link, then by their claim. Local notes are
/// matched by their claim, then by link; an unclaimed note only takes over
/// a link whose pair has no note yet. Anything left gets a fresh id.
fn assign(
    links: Vec<SyncLink>,
    records: Vec<SyncRecord>,
    remote: Vec<RemoteNative>,
    local: Vec<LocalNative>,
) -> BTreeMap<StableId, Slot> {
    let mut slots: BTreeMap<StableId, Slot> = BTreeMap::new();
    let mut by_remote = HashMap::new();
    let mut by_local = HashMap::new();
    for link in links {
        by_remote.insert(link.remote_id.clone(), link.stable_id);
        by_local.insert(link.local_path.clone(), link.stable_id);
        let stable_id = link.stable_id;
        slots.entry(stable_id).or_default().link = Some(link);
    }
    for record in records {
        let stable_id = record.stable_id;
        slots.entry(stable_id).or_default().record = Some(record);
    }

    for native in remote {
        let stable_id = by_remote
            .get(&native.document.id)
            .copied()
            .or(native.decoded.claim)
            .unwrap_or_else(StableId::generate);
        slots.entry(stable_id).or_default().remote.push(native);
    }

    let (claimed, unclaimed): (Vec<_>, Vec<_>) = local.into_iter().partition(|n| n.decoded.claim.is_some());
    for native in claimed {
        if let Some(stable_id) = native.decoded.claim {
            slots.entry(stable_id).or_default().local.push(native);
        }
    }
    for native in unclaimed {
        let stable_id = by_local
            .get(&native.file.path)
            .copied()
            .filter(|id| slots.get(id).is_none_or(|s| s.local.is_empty()))
            .unwrap_or_else(StableId::generate);
        slots.entry(stable_id).or_default().local.push(native);
    }
    slots
}

/// Choose vault paths for remote pages that have no note yet.
fn plan_local_paths(slots: &mut BTreeMap<StableId, Slot>, extension: &str) {
    let mut taken: HashSet<String> = HashSet::new();
    for slot in slots.values() {
        taken.extend(slot.local.iter().map(|n| n.file.path.as_str().to_lowercase()));
        taken.extend(slot.link.iter().map(|l| l.local_path.as_str().to_lowercase()));
    }

    for (stable_id, slot) in slots.iter_mut() {
        if !slot.local.is_empty() || slot.link.is_some() {
            continue;
        }
        let Some(native) = slot.remote.first() else {
            continue;
        };
        let base = match note_name(&native.document.page.title) {
            name if name.is_empty() => note_name(&native.document.id),
            name => name,
        };
        let base = if base.is_empty() { stable_id.to_string() } else { base };

        let mut candidate = format!("{base}.{extension}");
        let mut n = 2;
        while taken.contains(&candidate.to_lowercase()) {
            candidate = format!("{base} {n}.{extension}");
            n += 1;
        }
        taken.insert(candidate.to_lowercase());
        slot.planned_path = Some(NormalizedPath::new(candidate));
    }
}

/// A title reduced to something usable as a file name and wikilink.
fn note_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '^' | '[' | ']' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches('.')
        .trim()
        .to_string()
}
