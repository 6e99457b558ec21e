use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use docsync_content::RemotePage;
use docsync_fs::{NormalizedPath, RobustnessConfig, io};
use uuid::Uuid;

use super::{RemoteDocument, RemoteStore};
use crate::{Error, Result};

/// [`RemoteStore`] over a directory of `<remote_id>.json` page files.
///
/// Stands in for the remote service when working offline against an
/// exported workspace.
#[derive(Debug, Clone)]
pub struct JsonDirRemote {
    root: NormalizedPath,
}

impl JsonDirRemote {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            root: io::canonical_dir(dir.as_ref())?,
        })
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    fn page_path(&self, remote_id: &str) -> Result<NormalizedPath> {
        if remote_id.is_empty() || remote_id.contains(['/', '\\']) || remote_id.starts_with('.') {
            return Err(Error::Rejected {
                operation: "address remote document".into(),
                message: format!("'{remote_id}' is not a valid page id"),
            });
        }
        Ok(self.root.join_within(&format!("{remote_id}.json"))?)
    }
}

fn read_page(path: &NormalizedPath, remote_id: &str) -> Result<Option<RemoteDocument>> {
    let Some(text) = io::read_text_opt(path)? else {
        return Ok(None);
    };
    let mut document: RemoteDocument = serde_json::from_str(&text).map_err(|e| Error::Rejected {
        operation: format!("read remote document {remote_id}"),
        message: e.to_string(),
    })?;
    // The file name is authoritative
    document.id = remote_id.to_string();
    Ok(Some(document))
}

fn list_pages(root: &NormalizedPath) -> Result<Vec<RemoteDocument>> {
    let native = root.to_native();
    let mut documents = Vec::new();
    for entry in fs::read_dir(&native).map_err(|e| docsync_fs::Error::io(&native, e))? {
        let entry = entry.map_err(|e| docsync_fs::Error::io(&native, e))?;
        let path = NormalizedPath::new(entry.path());
        let (Some("json"), Some(stem)) = (path.extension(), path.file_stem()) else {
            continue;
        };
        if stem.starts_with('.') {
            continue;
        }
        match read_page(&path, stem) {
            Ok(Some(document)) => documents.push(document),
            Ok(None) => {}
            Err(Error::Rejected { message, .. }) => {
                tracing::warn!(path = %path, error = %message, "skipping unreadable remote page");
            }
            Err(e) => return Err(e),
        }
    }
    documents.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(documents)
}

#[async_trait]
impl RemoteStore for JsonDirRemote {
    async fn list_documents(&self) -> Result<Vec<RemoteDocument>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || list_pages(&root)).await?
    }

    async fn get_document(&self, remote_id: &str) -> Result<Option<RemoteDocument>> {
        let path = self.page_path(remote_id)?;
        let remote_id = remote_id.to_string();
        tokio::task::spawn_blocking(move || read_page(&path, &remote_id)).await?
    }

    async fn write_document(&self, remote_id: Option<&str>, page: &RemotePage) -> Result<String> {
        let id = remote_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let path = self.page_path(&id)?;
        let document = RemoteDocument {
            id: id.clone(),
            page: page.clone(),
            last_modified_hint: Some(Utc::now()),
        };
        let content = serde_json::to_vec_pretty(&document)?;
        tokio::task::spawn_blocking(move || io::write_atomic(&path, &content, RobustnessConfig::default())).await??;
        Ok(id)
    }

    async fn delete_document(&self, remote_id: &str) -> Result<()> {
        let path = self.page_path(remote_id)?;
        tokio::task::spawn_blocking(move || io::remove_file(&path)).await??;
        Ok(())
    }
}
