use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use docsync_content::RemotePage;

use super::{RemoteDocument, RemoteStore};
use crate::{Error, Result};

/// In-process [`RemoteStore`].
///
/// Counts every write and delete and can be told to fail or slow down,
/// which is what the engine tests lean on.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<String, RemoteDocument>,
    next_id: u64,
    failing_writes: u32,
    failing_lists: u32,
    latency: Option<Duration>,
    writes: u64,
    deletes: u64,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Put a page in place as if someone edited it remotely; not counted
    /// as a write.
    pub fn insert(&self, remote_id: impl Into<String>, page: RemotePage) {
        let id = remote_id.into();
        self.lock().documents.insert(
            id.clone(),
            RemoteDocument {
                id,
                page,
                last_modified_hint: Some(Utc::now()),
            },
        );
    }

    /// Delete a page behind the engine's back.
    pub fn remove(&self, remote_id: &str) -> Option<RemoteDocument> {
        self.lock().documents.remove(remote_id)
    }

    pub fn document(&self, remote_id: &str) -> Option<RemoteDocument> {
        self.lock().documents.get(remote_id).cloned()
    }

    pub fn documents(&self) -> Vec<RemoteDocument> {
        self.lock().documents.values().cloned().collect()
    }

    /// Fail the next `count` writes and deletes with a transient error.
    pub fn fail_next_writes(&self, count: u32) {
        self.lock().failing_writes = count;
    }

    pub fn fail_next_lists(&self, count: u32) {
        self.lock().failing_lists = count;
    }

    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    pub fn delete_count(&self) -> u64 {
        self.lock().deletes
    }

    fn take_failure(counter: &mut u32, operation: &str) -> Result<()> {
        if *counter > 0 {
            *counter -= 1;
            return Err(Error::transient(operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn list_documents(&self) -> Result<Vec<RemoteDocument>> {
        self.delay().await;
        let mut inner = self.lock();
        Self::take_failure(&mut inner.failing_lists, "list remote documents")?;
        Ok(inner.documents.values().cloned().collect())
    }

    async fn get_document(&self, remote_id: &str) -> Result<Option<RemoteDocument>> {
        self.delay().await;
        Ok(self.document(remote_id))
    }

    async fn write_document(&self, remote_id: Option<&str>, page: &RemotePage) -> Result<String> {
        self.delay().await;
        let mut inner = self.lock();
        Self::take_failure(&mut inner.failing_writes, "write remote document")?;

        let id = match remote_id {
            Some(id) => id.to_string(),
            None => loop {
                inner.next_id += 1;
                let candidate = format!("page-{}", inner.next_id);
                if !inner.documents.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        inner.writes += 1;
        inner.documents.insert(
            id.clone(),
            RemoteDocument {
                id: id.clone(),
                page: page.clone(),
                last_modified_hint: Some(Utc::now()),
            },
        );
        Ok(id)
    }

    async fn delete_document(&self, remote_id: &str) -> Result<()> {
        self.delay().await;
        let mut inner = self.lock();
        Self::take_failure(&mut inner.failing_writes, "delete remote document")?;
        if inner.documents.remove(remote_id).is_some() {
            inner.deletes += 1;
        }
        Ok(())
    }
}
