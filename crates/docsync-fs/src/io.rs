//! Atomic I/O operations with file locking

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::{Error, NormalizedPath, Result};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Tuning knobs for atomic writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobustnessConfig {
    /// How long to wait for the advisory lock before failing.
    pub lock_timeout: Duration,
    /// Flush the temp file to disk before renaming it into place.
    pub enable_fsync: bool,
    /// Serialize writers through a `<file>.lock` sidecar.
    ///
    /// Disable for user-visible directories (the vault) where stray
    /// sidecar files would be noise; the rename is still atomic.
    pub sidecar_lock: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            enable_fsync: true,
            sidecar_lock: true,
        }
    }
}

impl RobustnessConfig {
    /// Settings for files inside a user's vault.
    pub fn vault() -> Self {
        Self {
            sidecar_lock: false,
            ..Self::default()
        }
    }
}

/// An exclusive advisory lock held on a `<file>.lock` sidecar.
///
/// Released when dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire the sidecar lock for `target`, polling until `timeout`.
    pub fn acquire(target: &Path, timeout: Duration) -> Result<Self> {
        let lock_path = sidecar_path(target);
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::io(&lock_path, e))?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(Self {
                        file,
                        path: lock_path,
                    });
                }
                Err(_) if Instant::now() < deadline => thread::sleep(LOCK_POLL_INTERVAL),
                Err(_) => {
                    return Err(Error::LockFailed {
                        path: target.to_path_buf(),
                    });
                }
            }
        }
    }

    /// Path of the sidecar file backing this lock.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn sidecar_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

/// Write content atomically to a file.
///
/// Uses write-to-temp-then-rename so readers never observe a partial
/// write. With `sidecar_lock` enabled, concurrent writers to the same
/// target are serialized.
pub fn write_atomic(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let _guard = if config.sidecar_lock {
        Some(FileLock::acquire(&native_path, config.lock_timeout)?)
    } else {
        None
    };

    // Temp file in the same directory keeps the rename on one filesystem
    let temp_name = format!(
        ".{}.{}.{}.tmp",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let temp_path = native_path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;

    if config.enable_fsync {
        temp_file
            .sync_all()
            .map_err(|e| Error::io(&temp_path, e))?;
    }
    drop(temp_file);

    if let Err(e) = fs::rename(&temp_path, &native_path) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::io(&native_path, e));
    }

    tracing::trace!(path = %path, bytes = content.len(), "atomic write committed");
    Ok(())
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Read text content, mapping a missing file to `None`.
pub fn read_text_opt(path: &NormalizedPath) -> Result<Option<String>> {
    match read_text(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write text content to a file atomically with default settings.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes(), RobustnessConfig::default())
}

/// Append a single line to a file under the sidecar lock.
///
/// Used for append-only logs; the line is written with one `write_all`
/// call while the lock is held.
pub fn append_line(path: &NormalizedPath, line: &str, config: RobustnessConfig) -> Result<()> {
    let native_path = path.to_native();
    if let Some(parent) = native_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let _guard = FileLock::acquire(&native_path, config.lock_timeout)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&native_path)
        .map_err(|e| Error::io(&native_path, e))?;

    let mut buffer = String::with_capacity(line.len() + 1);
    buffer.push_str(line.trim_end_matches('\n'));
    buffer.push('\n');
    file.write_all(buffer.as_bytes())
        .map_err(|e| Error::io(&native_path, e))?;
    if config.enable_fsync {
        file.sync_all().map_err(|e| Error::io(&native_path, e))?;
    }
    Ok(())
}

/// Remove a file. A file that is already gone is not an error.
pub fn remove_file(path: &NormalizedPath) -> Result<()> {
    let native_path = path.to_native();
    match fs::remove_file(&native_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(&native_path, e)),
    }
}

/// Canonicalize a directory path without Windows verbatim prefixes.
pub fn canonical_dir(path: &Path) -> Result<NormalizedPath> {
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;
    let canonical = dunce::canonicalize(path).map_err(|e| Error::io(path, e))?;
    Ok(NormalizedPath::new(canonical))
}
