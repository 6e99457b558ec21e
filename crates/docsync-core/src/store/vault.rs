use std::path::Path;

use async_trait::async_trait;
use docsync_fs::{NormalizedPath, RobustnessConfig, io};
use walkdir::{DirEntry, WalkDir};

use super::{LocalFile, LocalStore};
use crate::Result;

/// [`LocalStore`] over a vault directory of markdown notes.
///
/// Hidden entries (`.obsidian`, `.git`, `.trash`, editor temp files) are
/// never listed. Writes replace files atomically and leave no lock files
/// behind in the vault.
#[derive(Debug, Clone)]
pub struct VaultDir {
    root: NormalizedPath,
    extension: String,
    robustness: RobustnessConfig,
}

impl VaultDir {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            root: io::canonical_dir(dir.as_ref())?,
            extension: "md".to_string(),
            robustness: RobustnessConfig::vault(),
        })
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    fn absolute(&self, path: &NormalizedPath) -> Result<NormalizedPath> {
        Ok(self.root.join_within(path.as_str())?)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn scan(root: &NormalizedPath, extension: &str) -> Result<Vec<LocalFile>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root.to_native())
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let absolute = NormalizedPath::new(entry.path());
        if !absolute
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            continue;
        }
        let Some(path) = absolute.relative_to(root) else {
            continue;
        };

        match io::read_text(&absolute) {
            Ok(text) => files.push(LocalFile { path, text }),
            Err(docsync_fs::Error::Io { source, .. }) if source.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!(path = %path, "skipping note that is not valid UTF-8");
            }
            // Deleted between listing and reading
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(files)
}

#[async_trait]
impl LocalStore for VaultDir {
    async fn list_files(&self) -> Result<Vec<LocalFile>> {
        let root = self.root.clone();
        let extension = self.extension.clone();
        tokio::task::spawn_blocking(move || scan(&root, &extension)).await?
    }

    async fn read_file(&self, path: &NormalizedPath) -> Result<Option<String>> {
        let absolute = self.absolute(path)?;
        Ok(tokio::task::spawn_blocking(move || io::read_text_opt(&absolute)).await??)
    }

    async fn write_file(&self, path: &NormalizedPath, text: &str) -> Result<()> {
        let absolute = self.absolute(path)?;
        let content = text.as_bytes().to_vec();
        let robustness = self.robustness;
        tokio::task::spawn_blocking(move || io::write_atomic(&absolute, &content, robustness)).await??;
        tracing::debug!(path = %path, "wrote note");
        Ok(())
    }

    async fn delete_file(&self, path: &NormalizedPath) -> Result<()> {
        let absolute = self.absolute(path)?;
        tokio::task::spawn_blocking(move || io::remove_file(&absolute)).await??;
        Ok(())
    }
}
