//! Sync engine for docsync
//!
//! This crate keeps a remote page store and a markdown vault in step,
//! implementing:
//!
//! - **Identity**: stable IDs for document pairs and link resolution
//!   between remote mentions and wikilinks
//! - **Change detection**: fingerprint comparison against the last
//!   synchronized state
//! - **Conflict resolution**: deterministic rules, configurable policy,
//!   and conflict artifacts for manual review
//! - **SyncEngine**: two-stage cycles with bounded concurrency, retries,
//!   and a scheduler driven by intervals and change events
//!
//! # Architecture
//!
//! `docsync-core` sits above the Layer 0 crates and below the CLI:
//!
//! ```text
//!              docsync-cli
//!                   |
//!              docsync-core
//!                   |
//!        +----------+----------+
//!        |                     |
//!   docsync-fs          docsync-content
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docsync_core::{FileStateStore, MemoryRemote, SyncConfig, SyncEngine, VaultDir};
//!
//! async fn example() -> docsync_core::Result<()> {
//!     let engine = SyncEngine::new(
//!         Arc::new(MemoryRemote::new()),
//!         Arc::new(VaultDir::open("vault")?),
//!         Arc::new(FileStateStore::open("state")?),
//!         SyncConfig::default(),
//!     );
//!     let summary = engine.run_cycle().await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod conflict;
pub mod detect;
pub mod error;
pub mod identity;
pub mod state;
pub mod store;
pub mod sync;

pub use config::SyncConfig;
pub use conflict::{
    ArtifactStatus, ConflictArtifact, DecisionReason, DecisionRecord, PairState, Policy, ResolutionChoice,
    resolve_artifact,
};
pub use detect::{ChangeKind, Side, detect};
pub use error::{Error, Result};
pub use identity::{IdentityMap, LinkResolver, ReferenceRegistry};
pub use state::{FileStateStore, PairCommit, StateStore, SyncLink, SyncRecord};
pub use store::{
    ChangeFeed, ChannelFeed, JsonDirRemote, LocalEvent, LocalFile, LocalStore, MemoryRemote, RemoteDocument,
    RemoteStore, VaultDir,
};
pub use sync::{CycleSummary, PairOutcome, PairReport, Scheduler, SchedulerStats, SyncEngine};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_store_error_displays_message() {
        let error = Error::state("pairs/abc.json is not valid JSON");

        let display = format!("{}", error);
        assert!(
            display.contains("pairs/abc.json"),
            "Error display should contain the message, got: {}",
            display
        );
        assert!(!error.is_transient());
    }
}
