//! Native id to stable id lookup for one cycle

use std::collections::HashMap;

use docsync_content::StableId;
use docsync_fs::NormalizedPath;

use crate::state::SyncLink;

/// Native identities known for one pair during a cycle.
///
/// Either side may be missing: a note created locally has no remote id
/// until its first remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub stable_id: StableId,
    pub remote_id: Option<String>,
    pub local_path: Option<NormalizedPath>,
    pub previous_local_paths: Vec<NormalizedPath>,
}

impl Binding {
    pub fn new(stable_id: StableId) -> Self {
        Self {
            stable_id,
            remote_id: None,
            local_path: None,
            previous_local_paths: Vec::new(),
        }
    }

    /// The name the note is best known by, for tombstones and logs.
    pub fn display_name(&self) -> String {
        self.local_path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(str::to_string)
            .or_else(|| self.remote_id.clone())
            .unwrap_or_else(|| self.stable_id.to_string())
    }

    /// Every wikilink key that names this note, current path first.
    pub fn local_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for path in self.local_path.iter().chain(&self.previous_local_paths) {
            for key in [wikilink_key(path.without_extension()), path_stem_key(path)] {
                if !key.is_empty() && !names.contains(&key) {
                    names.push(key);
                }
            }
        }
        names
    }
}

impl From<&SyncLink> for Binding {
    fn from(link: &SyncLink) -> Self {
        Self {
            stable_id: link.stable_id,
            remote_id: Some(link.remote_id.clone()),
            local_path: Some(link.local_path.clone()),
            previous_local_paths: link.previous_local_paths.clone(),
        }
    }
}

/// Lookup key for a wikilink target: no `.md`, no surrounding space,
/// case-insensitive.
pub(crate) fn wikilink_key(name: &str) -> String {
    let name = name.trim().trim_start_matches('/');
    let name = match name.len().checked_sub(3) {
        Some(idx) if name.is_char_boundary(idx) && name[idx..].eq_ignore_ascii_case(".md") => &name[..idx],
        _ => name,
    };
    name.to_lowercase()
}

fn path_stem_key(path: &NormalizedPath) -> String {
    path.file_stem().map(wikilink_key).unwrap_or_default()
}

#[derive(Debug, Default, Clone)]
pub struct IdentityMap {
    bindings: HashMap<StableId, Binding>,
    by_remote: HashMap<String, StableId>,
    by_path: HashMap<String, StableId>,
    by_stem: HashMap<String, Vec<StableId>>,
    by_previous: HashMap<String, StableId>,
}

impl IdentityMap {
    pub fn new(bindings: impl IntoIterator<Item = Binding>) -> Self {
        let mut map = Self::default();
        for binding in bindings {
            map.insert(binding);
        }
        map
    }

    pub fn insert(&mut self, binding: Binding) {
        let id = binding.stable_id;
        if let Some(remote_id) = &binding.remote_id {
            self.by_remote.insert(remote_id.clone(), id);
        }
        if let Some(path) = &binding.local_path {
            self.by_path.insert(wikilink_key(path.without_extension()), id);
            let stems = self.by_stem.entry(path_stem_key(path)).or_default();
            if !stems.contains(&id) {
                stems.push(id);
            }
        }
        for previous in &binding.previous_local_paths {
            self.by_previous.insert(wikilink_key(previous.without_extension()), id);
            self.by_previous.entry(path_stem_key(previous)).or_insert(id);
        }
        self.bindings.insert(id, binding);
    }

    pub fn binding(&self, stable_id: StableId) -> Option<&Binding> {
        self.bindings.get(&stable_id)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn by_remote(&self, remote_id: &str) -> Option<StableId> {
        self.by_remote.get(remote_id).copied()
    }

    /// Resolve a wikilink target.
    ///
    /// Tries the vault-relative path, then the file stem (only when one
    /// note has it), then names the note had before a rename.
    pub fn by_wikilink(&self, name: &str) -> Option<StableId> {
        let key = wikilink_key(name);
        if key.is_empty() {
            return None;
        }
        if let Some(id) = self.by_path.get(&key) {
            return Some(*id);
        }
        if let Some([id]) = self.by_stem.get(&key).map(Vec::as_slice) {
            return Some(*id);
        }
        self.by_previous.get(&key).copied()
    }

    /// How local notes should spell a link to `stable_id`.
    pub fn wikilink_name(&self, stable_id: StableId) -> Option<String> {
        let path = self.bindings.get(&stable_id)?.local_path.as_ref()?;
        let stem = path.file_stem()?;
        let unique = self
            .by_stem
            .get(&wikilink_key(stem))
            .is_some_and(|ids| ids.len() == 1);
        Some(if unique {
            stem.to_string()
        } else {
            path.without_extension().to_string()
        })
    }
}
