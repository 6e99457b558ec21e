//! Shared setup for engine tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use docsync_content::RemotePage;
use docsync_core::{FileStateStore, MemoryRemote, StateStore, SyncConfig, SyncEngine, SyncLink, VaultDir};
use docsync_fs::NormalizedPath;
use serde_json::{Value, json};
use tempfile::TempDir;

/// A memory remote, a vault and a state dir in one temp dir.
pub struct Harness {
    pub dir: TempDir,
    pub remote: Arc<MemoryRemote>,
    pub state: Arc<FileStateStore>,
    pub config: SyncConfig,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("vault")).unwrap();
        let state = Arc::new(FileStateStore::open(dir.path().join("state")).unwrap());

        let mut config = SyncConfig::default();
        config.retry.max_attempts = 2;
        config.retry.initial_backoff_ms = 1;
        config.retry.max_backoff_ms = 5;
        config.retry.timeout_ms = 5_000;

        Self {
            dir,
            remote: Arc::new(MemoryRemote::new()),
            state,
            config,
        }
    }

    pub fn vault(&self) -> PathBuf {
        self.dir.path().join("vault")
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(
            self.remote.clone(),
            Arc::new(VaultDir::open(self.vault()).unwrap()),
            self.state.clone(),
            self.config.clone(),
        )
    }

    pub fn write_note(&self, name: &str, text: &str) {
        let path = self.vault().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }

    pub fn read_note(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.vault().join(name)).ok()
    }

    pub fn remove_note(&self, name: &str) {
        fs::remove_file(self.vault().join(name)).unwrap();
    }

    pub fn link_for_note(&self, name: &str) -> SyncLink {
        self.state
            .find_link_by_local(&NormalizedPath::new(name))
            .unwrap()
            .unwrap_or_else(|| panic!("no link for {name}"))
    }

    /// Replace a page's blocks, keeping its title and properties.
    pub fn edit_page(&self, remote_id: &str, blocks: Vec<Value>) {
        let mut page = self.remote.document(remote_id).unwrap().page;
        page.blocks = blocks;
        self.remote.insert(remote_id, page);
    }

    /// Set one property on a page, keeping everything else.
    pub fn set_page_property(&self, remote_id: &str, name: &str, value: Value) {
        let mut page = self.remote.document(remote_id).unwrap().page;
        page.properties.insert(name.to_string(), value);
        self.remote.insert(remote_id, page);
    }

    /// Plain text of every paragraph on a page.
    pub fn page_text(&self, remote_id: &str) -> String {
        let page = self.remote.document(remote_id).unwrap().page;
        page.blocks
            .iter()
            .filter_map(|b| b.pointer("/paragraph/rich_text"))
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|item| item.get("plain_text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn page(title: &str, blocks: Vec<Value>) -> RemotePage {
    RemotePage {
        title: title.to_string(),
        blocks,
        ..Default::default()
    }
}

pub fn paragraph(text: &str) -> Value {
    json!({
        "type": "paragraph",
        "paragraph": { "rich_text": [
            { "type": "text", "text": { "content": text }, "plain_text": text }
        ]}
    })
}

pub fn paragraph_with_mention(text: &str, page_id: &str, display: &str) -> Value {
    json!({
        "type": "paragraph",
        "paragraph": { "rich_text": [
            { "type": "text", "text": { "content": text }, "plain_text": text },
            { "type": "mention", "mention": { "type": "page", "page": { "id": page_id } }, "plain_text": display }
        ]}
    })
}
