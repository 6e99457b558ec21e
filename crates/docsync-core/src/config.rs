//! Sync configuration
//!
//! Loaded through [`docsync_fs::ConfigStore`], so TOML, JSON and YAML all
//! work; `config.toml` in the state directory is the canonical location.
//! Every field has a default and a missing file yields
//! [`SyncConfig::default`].
//!
//! ```toml
//! [sync]
//! policy = "prefer-local"
//! max_concurrency = 8
//!
//! [retry]
//! max_attempts = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use chrono::{DateTime, Utc};
use docsync_fs::{ConfigStore, NormalizedPath};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::conflict::Policy;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub sync: SyncSection,
    pub retry: RetryConfig,
    pub local: LocalSection,
    pub remote: RemoteSection,
    pub state: StateSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub policy: Policy,
    /// Seconds between scheduled cycles.
    pub interval_secs: u64,
    /// Pairs processed at once during the write stage.
    pub max_concurrency: usize,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            policy: Policy::Manual,
            interval_secs: 60,
            max_concurrency: 4,
        }
    }
}

impl SyncSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Timeout and retry settings applied to every store call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            timeout_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// A fresh backoff schedule; attempts are bounded by `max_attempts`,
    /// not by elapsed time.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms)))
            .with_max_elapsed_time(None)
            .build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSection {
    pub vault: Option<PathBuf>,
    /// Extension of synced notes, without the dot.
    pub extension: String,
}

impl Default for LocalSection {
    fn default() -> Self {
        Self {
            vault: None,
            extension: "md".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    /// Directory mirrored by the JSON-directory remote.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSection {
    pub dir: Option<PathBuf>,
    /// Days a deleted document's tombstone is kept; 0 keeps them forever.
    pub tombstone_retention_days: u32,
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            dir: None,
            tombstone_retention_days: 90,
        }
    }
}

impl StateSection {
    /// Tombstones older than this are dropped, if retention is bounded.
    pub fn tombstone_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.tombstone_retention_days {
            0 => None,
            days => Some(now - chrono::Duration::days(i64::from(days))),
        }
    }
}

impl SyncConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = NormalizedPath::new(path);
        Ok(ConfigStore::new().load_or_default(&path)?)
    }

    /// Load `config.toml` from a state directory.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::load(dir.as_ref().join(CONFIG_FILE))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        ConfigStore::new().save(&NormalizedPath::new(path), self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = SyncConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.sync.policy, Policy::Manual);
        assert_eq!(config.local.extension, "md");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[sync]\npolicy = \"prefer-remote\"\n\n[retry]\nmax_attempts = 2\n",
        )
        .unwrap();

        let config = SyncConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.sync.policy, Policy::PreferRemote);
        assert_eq!(config.sync.max_concurrency, 4);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.timeout_ms, 30_000);
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docsync.json");
        let mut config = SyncConfig::default();
        config.local.vault = Some(PathBuf::from("/notes"));
        config.sync.interval_secs = 5;
        config.save(&path).unwrap();

        assert_eq!(SyncConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn zero_retention_keeps_tombstones() {
        let now = Utc::now();
        let mut state = StateSection::default();
        assert_eq!(state.tombstone_cutoff(now), Some(now - chrono::Duration::days(90)));
        state.tombstone_retention_days = 0;
        assert_eq!(state.tombstone_cutoff(now), None);
    }

    #[test]
    fn backoff_starts_at_initial_interval() {
        use backoff::backoff::Backoff;

        let retry = RetryConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 100,
            ..RetryConfig::default()
        };
        let mut schedule = retry.backoff();
        let first = schedule.next_backoff().unwrap();
        assert!(first <= Duration::from_millis(150), "{first:?}");
    }
}
