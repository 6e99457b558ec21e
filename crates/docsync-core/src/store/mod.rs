//! Native stores the engine reads from and writes to
//!
//! The engine only sees these traits. Implementations here cover a vault
//! directory, a directory of remote page JSON, an in-memory remote and a
//! channel-fed change stream.

mod feed;
mod json_dir;
mod memory;
mod vault;

pub use feed::ChannelFeed;
pub use json_dir::JsonDirRemote;
pub use memory::MemoryRemote;
pub use vault::VaultDir;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docsync_content::RemotePage;
use docsync_fs::NormalizedPath;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::detect::ChangeKind;

/// A page as listed by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub page: RemotePage,
    /// Advisory only; change detection never reads it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_hint: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<RemoteDocument>>;

    async fn get_document(&self, remote_id: &str) -> Result<Option<RemoteDocument>>;

    /// Replace the page `remote_id`, or create a new page when `None`.
    /// Returns the page's id.
    async fn write_document(&self, remote_id: Option<&str>, page: &RemotePage) -> Result<String>;

    /// Deleting a page that no longer exists succeeds.
    async fn delete_document(&self, remote_id: &str) -> Result<()>;
}

/// A note as listed by the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Relative to the vault root.
    pub path: NormalizedPath,
    pub text: String,
}

#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn list_files(&self) -> Result<Vec<LocalFile>>;

    async fn read_file(&self, path: &NormalizedPath) -> Result<Option<String>>;

    async fn write_file(&self, path: &NormalizedPath, text: &str) -> Result<()>;

    /// Deleting a file that no longer exists succeeds.
    async fn delete_file(&self, path: &NormalizedPath) -> Result<()>;
}

/// A change the local watcher saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEvent {
    pub path: NormalizedPath,
    pub kind: ChangeKind,
}

impl LocalEvent {
    pub fn new(path: impl Into<NormalizedPath>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Batches of local change events.
///
/// Events only trigger cycles; every cycle still lists both stores in
/// full, so a dropped or duplicated event never causes a missed change.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Wait for the next batch; `None` once the feed has closed.
    async fn next_batch(&mut self) -> Option<Vec<LocalEvent>>;

    /// A batch that is already queued, without waiting.
    fn try_next_batch(&mut self) -> Option<Vec<LocalEvent>>;
}
