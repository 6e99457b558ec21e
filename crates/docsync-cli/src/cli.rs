//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use docsync_core::Policy;

/// docsync - Keep a remote page store and a markdown vault in sync
#[derive(Parser, Debug)]
#[command(name = "docsync")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding sync state and config.toml
    #[arg(long, global = true, env = "DOCSYNC_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run one sync cycle and print its summary
    Sync {
        #[command(flatten)]
        stores: StoreArgs,

        /// Output the cycle summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync on an interval and whenever the vault changes, until Ctrl-C
    Watch {
        #[command(flatten)]
        stores: StoreArgs,

        /// Seconds between scheduled cycles
        #[arg(long)]
        interval: Option<u64>,
    },

    /// List synced pairs with their versions and fingerprints
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List conflict artifacts
    ///
    /// Only unresolved conflicts are shown unless --all is given.
    Conflicts {
        /// Include resolved and applied conflicts
        #[arg(long)]
        all: bool,
    },

    /// Resolve a conflict by picking one side
    ///
    /// The chosen content is written to both sides on the next sync.
    ///
    /// Examples:
    ///   docsync resolve 3f2a9c1e --take local
    ///   docsync resolve 3f2a9c1e --take remote
    Resolve {
        /// Artifact id, or a unique prefix of it
        artifact_id: String,

        /// Which side's content to keep
        #[arg(long, value_enum)]
        take: Take,
    },

    /// Print the decision log
    Decisions {
        /// Only show the most recent N decisions
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Store locations; each overrides the matching config.toml value.
#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreArgs {
    /// Markdown vault directory
    #[arg(long)]
    pub vault: Option<PathBuf>,

    /// Directory of remote page JSON files
    #[arg(long)]
    pub remote_dir: Option<PathBuf>,

    /// Conflict policy: prefer-remote, prefer-local or manual
    #[arg(long)]
    pub policy: Option<Policy>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Take {
    Remote,
    Local,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_sync_with_stores() {
        let cli = Cli::parse_from([
            "docsync",
            "--state-dir",
            "/tmp/state",
            "sync",
            "--vault",
            "/tmp/vault",
            "--remote-dir",
            "/tmp/remote",
            "--policy",
            "prefer-local",
        ]);
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/state")));
        let Commands::Sync { stores, json } = cli.command else {
            panic!("expected sync");
        };
        assert!(!json);
        assert_eq!(stores.vault, Some(PathBuf::from("/tmp/vault")));
        assert_eq!(stores.policy, Some(Policy::PreferLocal));
    }

    #[test]
    fn parse_resolve() {
        let cli = Cli::parse_from(["docsync", "resolve", "3f2a", "--take", "remote"]);
        assert_eq!(
            cli.command,
            Commands::Resolve {
                artifact_id: "3f2a".into(),
                take: Take::Remote,
            }
        );
    }

    #[test]
    fn rejects_unknown_policy() {
        let result = Cli::try_parse_from(["docsync", "sync", "--policy", "newest"]);
        assert!(result.is_err());
    }
}
