//! State store backed by JSON files in a directory
//!
//! Layout:
//!
//! ```text
//! <dir>/pairs/<stable_id>.json      record + link, replaced atomically
//! <dir>/conflicts/<artifact_id>.json
//! <dir>/decisions.jsonl             append-only
//! <dir>/references.json
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use docsync_content::StableId;
use docsync_fs::{NormalizedPath, RobustnessConfig, io};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{PairCommit, StateStore, SyncLink, SyncRecord};
use crate::conflict::{ConflictArtifact, DecisionRecord};
use crate::identity::ReferenceRegistry;
use crate::{Error, Result};

const PAIRS_DIR: &str = "pairs";
const CONFLICTS_DIR: &str = "conflicts";
const DECISIONS_FILE: &str = "decisions.jsonl";
const REFERENCES_FILE: &str = "references.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PairFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    record: Option<SyncRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    link: Option<SyncLink>,
}

/// In-memory lookup of active links, rebuilt from disk on open.
#[derive(Debug, Default)]
struct LinkIndex {
    links: BTreeMap<StableId, SyncLink>,
    by_remote: HashMap<String, StableId>,
    by_local: HashMap<NormalizedPath, StableId>,
}

impl LinkIndex {
    fn insert(&mut self, link: SyncLink) {
        self.remove(link.stable_id);
        self.by_remote.insert(link.remote_id.clone(), link.stable_id);
        self.by_local.insert(link.local_path.clone(), link.stable_id);
        self.links.insert(link.stable_id, link);
    }

    fn remove(&mut self, stable_id: StableId) {
        if let Some(old) = self.links.remove(&stable_id) {
            if self.by_remote.get(&old.remote_id) == Some(&stable_id) {
                self.by_remote.remove(&old.remote_id);
            }
            if self.by_local.get(&old.local_path) == Some(&stable_id) {
                self.by_local.remove(&old.local_path);
            }
        }
    }

    /// Other stable ids already holding one of `link`'s native ids.
    fn claimants(&self, link: &SyncLink) -> Vec<String> {
        let mut claimants = Vec::new();
        if let Some(owner) = self.by_remote.get(&link.remote_id)
            && *owner != link.stable_id
        {
            claimants.push(format!("remote:{} (held by {owner})", link.remote_id));
        }
        if let Some(owner) = self.by_local.get(&link.local_path)
            && *owner != link.stable_id
        {
            claimants.push(format!("local:{} (held by {owner})", link.local_path));
        }
        claimants
    }
}

/// [`StateStore`] persisting one JSON file per pair.
///
/// Writes to the same stable id are serialized by an in-process mutex per
/// id and by the `fs2` sidecar lock that `write_atomic` takes on the target.
#[derive(Debug)]
pub struct FileStateStore {
    root: NormalizedPath,
    robustness: RobustnessConfig,
    index: Mutex<LinkIndex>,
    key_locks: Mutex<HashMap<StableId, Arc<Mutex<()>>>>,
}

impl FileStateStore {
    /// Open (creating if needed) the state directory and index its links.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let root = io::canonical_dir(dir.as_ref())?;
        for sub in [PAIRS_DIR, CONFLICTS_DIR] {
            let native = root.join(sub).to_native();
            fs::create_dir_all(&native).map_err(|e| docsync_fs::Error::io(&native, e))?;
        }

        let store = Self {
            root,
            robustness: RobustnessConfig::default(),
            index: Mutex::new(LinkIndex::default()),
            key_locks: Mutex::new(HashMap::new()),
        };

        let mut index = LinkIndex::default();
        for path in json_files(&store.root.join(PAIRS_DIR))? {
            let pair: PairFile = read_json(&path)?.unwrap_or_default();
            if let Some(link) = pair.link {
                index.insert(link);
            }
        }
        tracing::debug!(root = %store.root, links = index.links.len(), "opened state store");
        *store.lock_index()? = index;
        Ok(store)
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    fn pair_path(&self, stable_id: StableId) -> NormalizedPath {
        self.root.join(PAIRS_DIR).join(&format!("{stable_id}.json"))
    }

    fn artifact_path(&self, artifact: &ConflictArtifact) -> NormalizedPath {
        self.root.join(CONFLICTS_DIR).join(&format!("{}.json", artifact.id))
    }

    fn read_pair(&self, stable_id: StableId) -> Result<PairFile> {
        Ok(read_json(&self.pair_path(stable_id))?.unwrap_or_default())
    }

    fn write_json<T: Serialize>(&self, path: &NormalizedPath, value: &T) -> Result<()> {
        let content = serde_json::to_vec_pretty(value)?;
        io::write_atomic(path, &content, self.robustness)?;
        Ok(())
    }

    fn lock_index(&self) -> Result<MutexGuard<'_, LinkIndex>> {
        self.index.lock().map_err(|_| Error::state("link index lock poisoned"))
    }

    /// Run `f` while holding the write lock for one stable id.
    fn with_key<T>(&self, stable_id: StableId, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = {
            let mut locks = self
                .key_locks
                .lock()
                .map_err(|_| Error::state("key lock table poisoned"))?;
            Arc::clone(locks.entry(stable_id).or_default())
        };
        let _guard = lock
            .lock()
            .map_err(|_| Error::state(format!("write lock for {stable_id} poisoned")))?;
        f()
    }
}

impl StateStore for FileStateStore {
    fn get(&self, stable_id: StableId) -> Result<Option<SyncRecord>> {
        Ok(self.read_pair(stable_id)?.record)
    }

    fn put(&self, record: SyncRecord) -> Result<()> {
        let stable_id = record.stable_id;
        self.with_key(stable_id, || {
            let mut pair = self.read_pair(stable_id)?;
            pair.record = Some(record);
            self.write_json(&self.pair_path(stable_id), &pair)
        })
    }

    fn list_all(&self) -> Result<Vec<SyncRecord>> {
        let mut records = Vec::new();
        for path in json_files(&self.root.join(PAIRS_DIR))? {
            let pair: Option<PairFile> = read_json(&path)?;
            records.extend(pair.and_then(|p| p.record));
        }
        Ok(records)
    }

    fn create_link(&self, link: SyncLink) -> Result<()> {
        let stable_id = link.stable_id;
        self.with_key(stable_id, || {
            let mut index = self.lock_index()?;
            let claimants = index.claimants(&link);
            if !claimants.is_empty() {
                return Err(Error::IdentityConflict { stable_id, claimants });
            }
            let mut pair = self.read_pair(stable_id)?;
            pair.link = Some(link.clone());
            self.write_json(&self.pair_path(stable_id), &pair)?;
            index.insert(link);
            Ok(())
        })
    }

    fn find_link_by_remote(&self, remote_id: &str) -> Result<Option<SyncLink>> {
        let index = self.lock_index()?;
        Ok(index
            .by_remote
            .get(remote_id)
            .and_then(|id| index.links.get(id))
            .cloned())
    }

    fn find_link_by_local(&self, local_path: &NormalizedPath) -> Result<Option<SyncLink>> {
        let index = self.lock_index()?;
        Ok(index
            .by_local
            .get(local_path)
            .and_then(|id| index.links.get(id))
            .cloned())
    }

    fn list_links(&self) -> Result<Vec<SyncLink>> {
        Ok(self.lock_index()?.links.values().cloned().collect())
    }

    fn commit(&self, commit: PairCommit) -> Result<()> {
        let stable_id = commit.record.stable_id;
        if commit.link.stable_id != stable_id {
            return Err(Error::state(format!(
                "commit for {stable_id} carries the link of {}",
                commit.link.stable_id
            )));
        }
        self.with_key(stable_id, || {
            let mut index = self.lock_index()?;
            let claimants = index.claimants(&commit.link);
            if !claimants.is_empty() {
                return Err(Error::IdentityConflict { stable_id, claimants });
            }
            let pair = PairFile {
                record: Some(commit.record),
                link: Some(commit.link.clone()),
            };
            self.write_json(&self.pair_path(stable_id), &pair)?;
            index.insert(commit.link);
            Ok(())
        })
    }

    fn remove_pair(&self, stable_id: StableId) -> Result<()> {
        self.with_key(stable_id, || {
            let mut index = self.lock_index()?;
            io::remove_file(&self.pair_path(stable_id))?;
            index.remove(stable_id);
            Ok(())
        })
    }

    fn list_artifacts(&self) -> Result<Vec<ConflictArtifact>> {
        let mut artifacts = Vec::new();
        for path in json_files(&self.root.join(CONFLICTS_DIR))? {
            artifacts.extend(read_json::<ConflictArtifact>(&path)?);
        }
        artifacts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(artifacts)
    }

    fn put_artifact(&self, artifact: &ConflictArtifact) -> Result<()> {
        self.with_key(artifact.stable_id, || {
            self.write_json(&self.artifact_path(artifact), artifact)
        })
    }

    fn append_decision(&self, decision: &DecisionRecord) -> Result<()> {
        let line = serde_json::to_string(decision)?;
        io::append_line(&self.root.join(DECISIONS_FILE), &line, self.robustness)?;
        Ok(())
    }

    fn decisions(&self) -> Result<Vec<DecisionRecord>> {
        let Some(text) = io::read_text_opt(&self.root.join(DECISIONS_FILE))? else {
            return Ok(Vec::new());
        };
        let mut decisions = Vec::new();
        for (idx, line) in text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(decision) => decisions.push(decision),
                Err(e) => tracing::warn!(line = idx + 1, error = %e, "skipping unreadable decision record"),
            }
        }
        Ok(decisions)
    }

    fn load_references(&self) -> Result<ReferenceRegistry> {
        Ok(read_json(&self.root.join(REFERENCES_FILE))?.unwrap_or_default())
    }

    fn save_references(&self, registry: &ReferenceRegistry) -> Result<()> {
        self.write_json(&self.root.join(REFERENCES_FILE), registry)
    }
}

fn read_json<T: DeserializeOwned>(path: &NormalizedPath) -> Result<Option<T>> {
    let Some(text) = io::read_text_opt(path)? else {
        return Ok(None);
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| Error::state(format!("unreadable state file {path}: {e}")))
}

/// `*.json` files directly inside `dir`, skipping temp and hidden files.
fn json_files(dir: &NormalizedPath) -> Result<Vec<NormalizedPath>> {
    let native = dir.to_native();
    let entries = match fs::read_dir(&native) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(docsync_fs::Error::io(&native, e).into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| docsync_fs::Error::io(&native, e))?;
        let path = NormalizedPath::new(entry.path());
        let hidden = path.file_name().is_some_and(|n| n.starts_with('.'));
        if !hidden && path.extension() == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
