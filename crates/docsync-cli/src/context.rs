//! Resolved state directory, config and stores for a command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docsync_core::config::CONFIG_FILE;
use docsync_core::{FileStateStore, JsonDirRemote, SyncConfig, SyncEngine, VaultDir};

use crate::cli::StoreArgs;
use crate::error::{CliError, Result};

const STATE_DIR_NAME: &str = "docsync";

/// Default state directory when `--state-dir` is not given.
pub fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(STATE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".docsync"))
}

#[derive(Debug)]
pub struct Context {
    pub state_dir: PathBuf,
    pub config: SyncConfig,
}

impl Context {
    /// Load `config.toml` from the state directory; a missing file means defaults.
    pub fn load(state_dir: Option<PathBuf>) -> Result<Self> {
        let state_dir = state_dir.unwrap_or_else(default_state_dir);
        let mut config = SyncConfig::load_from_dir(&state_dir)?;
        config.state.dir = Some(state_dir.clone());
        tracing::debug!(state_dir = %state_dir.display(), "loaded config");
        Ok(Self { state_dir, config })
    }

    /// Apply command line overrides on top of the file values.
    pub fn with_stores(mut self, stores: &StoreArgs) -> Self {
        if let Some(vault) = &stores.vault {
            self.config.local.vault = Some(vault.clone());
        }
        if let Some(remote_dir) = &stores.remote_dir {
            self.config.remote.dir = Some(remote_dir.clone());
        }
        if let Some(policy) = stores.policy {
            self.config.sync.policy = policy;
        }
        self
    }

    pub fn state(&self) -> Result<FileStateStore> {
        Ok(FileStateStore::open(&self.state_dir)?)
    }

    pub fn vault_dir(&self) -> Result<&Path> {
        self.config
            .local
            .vault
            .as_deref()
            .ok_or_else(|| CliError::user("no vault configured (pass --vault or set [local] vault in config.toml)"))
    }

    pub fn remote_dir(&self) -> Result<&Path> {
        self.config
            .remote
            .dir
            .as_deref()
            .ok_or_else(|| CliError::user("no remote configured (pass --remote-dir or set [remote] dir in config.toml)"))
    }

    pub fn vault(&self) -> Result<VaultDir> {
        Ok(VaultDir::open(self.vault_dir()?)?.with_extension(self.config.local.extension.clone()))
    }

    pub fn engine(&self) -> Result<SyncEngine> {
        let vault = self.vault()?;
        let remote = JsonDirRemote::open(self.remote_dir()?)?;
        Ok(SyncEngine::new(
            Arc::new(remote),
            Arc::new(vault),
            Arc::new(self.state()?),
            self.config.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_core::Policy;
    use tempfile::TempDir;

    #[test]
    fn flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[sync]\npolicy = \"prefer-remote\"\n\n[local]\nvault = \"/from/file\"\n",
        )
        .unwrap();

        let context = Context::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(context.config.sync.policy, Policy::PreferRemote);
        assert_eq!(context.vault_dir().unwrap(), Path::new("/from/file"));

        let context = context.with_stores(&StoreArgs {
            vault: Some(PathBuf::from("/from/flag")),
            remote_dir: None,
            policy: Some(Policy::Manual),
        });
        assert_eq!(context.config.sync.policy, Policy::Manual);
        assert_eq!(context.vault_dir().unwrap(), Path::new("/from/flag"));
        assert!(context.remote_dir().is_err());
    }
}
