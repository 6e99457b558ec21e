//! Normalized path handling for vault-relative and absolute paths

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A path normalized to forward slashes with `.`/`..` segments resolved.
///
/// Vault notes are addressed by relative `NormalizedPath`s so that the
/// same note has one spelling regardless of platform or how the watcher
/// reported it. Conversion to a native `PathBuf` only happens at I/O
/// boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedPath {
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        Self {
            inner: clean(&raw),
        }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Join this path with a (possibly multi-segment) relative segment.
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.replace('\\', "/");
        if self.inner.is_empty() {
            return Self::new(segment);
        }
        let joined = if self.inner.ends_with('/') {
            format!("{}{}", self.inner, segment)
        } else {
            format!("{}/{}", self.inner, segment)
        };
        Self {
            inner: clean(&joined),
        }
    }

    /// Join a relative segment, refusing results that leave this directory.
    pub fn join_within(&self, segment: &str) -> crate::Result<Self> {
        let joined = self.join(segment);
        if joined.relative_to(self).is_none() {
            return Err(crate::Error::PathEscapesRoot {
                path: segment.to_string(),
            });
        }
        Ok(joined)
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        match self.inner.rfind('/') {
            Some(0) if self.inner.len() > 1 => Some(Self {
                inner: "/".to_string(),
            }),
            Some(idx) if idx > 0 => Some(Self {
                inner: self.inner[..idx].to_string(),
            }),
            _ => None,
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        self.inner.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Get the file name without its extension.
    pub fn file_stem(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rfind('.') {
            Some(idx) if idx > 0 => Some(&name[..idx]),
            _ => Some(name),
        }
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 { None } else { Some(&name[idx + 1..]) }
        })
    }

    /// The full path with the extension of the final component removed.
    pub fn without_extension(&self) -> &str {
        match self.extension() {
            Some(ext) => &self.inner[..self.inner.len() - ext.len() - 1],
            None => &self.inner,
        }
    }

    /// Replace (or add) the extension of the final component.
    pub fn with_extension(&self, extension: &str) -> Self {
        Self {
            inner: format!("{}.{}", self.without_extension(), extension),
        }
    }

    /// Express this path relative to `root`, if it lives beneath it.
    pub fn relative_to(&self, root: &NormalizedPath) -> Option<Self> {
        let root = root.inner.trim_end_matches('/');
        if root.is_empty() {
            return Some(self.clone());
        }
        let rest = self.inner.strip_prefix(root)?;
        let rest = rest.strip_prefix('/')?;
        Some(Self {
            inner: rest.to_string(),
        })
    }

    /// Check if this path exists on the filesystem.
    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }

    /// Check if this appears to be a network path (UNC or URL-style).
    pub fn is_network_path(&self) -> bool {
        self.inner.starts_with("//")
            || self.inner.starts_with("smb:/")
            || self.inner.starts_with("nfs:/")
    }
}

/// Collapse empty and `.` segments and resolve `..` without escaping the root.
///
/// A leading `//` (network share) is preserved; leading `..` segments of a
/// relative path are dropped.
fn clean(raw: &str) -> String {
    let network = raw.starts_with("//") && !raw.starts_with("///");
    let absolute = raw.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let body = segments.join("/");
    if network {
        format!("//{body}")
    } else if absolute {
        format!("/{body}")
    } else {
        body
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_and_extension() {
        let path = NormalizedPath::new("notes/Daily Log.md");
        assert_eq!(path.file_stem(), Some("Daily Log"));
        assert_eq!(path.extension(), Some("md"));
        assert_eq!(path.without_extension(), "notes/Daily Log");
    }

    #[test]
    fn dotfile_has_no_extension() {
        let path = NormalizedPath::new(".docsync");
        assert_eq!(path.extension(), None);
        assert_eq!(path.file_stem(), Some(".docsync"));
    }

    #[test]
    fn relative_to_strips_root() {
        let root = NormalizedPath::new("/vault");
        let note = NormalizedPath::new("/vault/a/b.md");
        assert_eq!(note.relative_to(&root).unwrap().as_str(), "a/b.md");
        assert!(NormalizedPath::new("/vaultx/b.md").relative_to(&root).is_none());
    }

    #[test]
    fn join_within_rejects_escape() {
        let root = NormalizedPath::new("/vault");
        assert_eq!(root.join_within("a/b.md").unwrap().as_str(), "/vault/a/b.md");
        assert!(root.join_within("../etc/passwd").is_err());
    }

    #[test]
    fn with_extension_replaces_existing() {
        let path = NormalizedPath::new("a/b.txt");
        assert_eq!(path.with_extension("md").as_str(), "a/b.md");
        assert_eq!(NormalizedPath::new("a/b").with_extension("md").as_str(), "a/b.md");
    }
}
