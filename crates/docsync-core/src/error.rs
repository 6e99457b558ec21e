//! Error types for docsync-core

use docsync_content::StableId;

/// Result type for docsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while syncing
///
/// Per-pair errors (`Transient`, `Timeout`, `IdentityConflict`, `Rejected`)
/// fail only the pair they occur in; `StateStore` and listing failures
/// abort the cycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A remote or local call failed in a way worth retrying
    #[error("{operation} failed: {message}")]
    Transient { operation: String, message: String },

    /// A store call did not answer within the configured timeout
    #[error("{operation} timed out")]
    Timeout { operation: String },

    /// A store refused an operation; retrying will not help
    #[error("{operation} rejected: {message}")]
    Rejected { operation: String, message: String },

    /// More than one native document maps to the same pair
    #[error("identity conflict on {stable_id}: claimed by {}", claimants.join(", "))]
    IdentityConflict {
        stable_id: StableId,
        claimants: Vec<String>,
    },

    /// The sync state could not be read or written
    #[error("sync state unavailable: {message}")]
    StateStore { message: String },

    /// `run_cycle` was called while another cycle was running
    #[error("a sync cycle is already in progress")]
    CycleInProgress,

    #[error("conflict artifact not found: {id}")]
    ArtifactNotFound { id: String },

    #[error("conflict artifact {id} was already applied")]
    ArtifactApplied { id: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from docsync-fs
    #[error(transparent)]
    Fs(#[from] docsync_fs::Error),

    /// Content error from docsync-content
    #[error(transparent)]
    Content(#[from] docsync_content::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A blocking task panicked or was cancelled
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::StateStore {
            message: message.into(),
        }
    }

    /// Whether retrying the failed call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient { .. } | Self::Timeout { .. } | Self::Io(_) => true,
            Self::Fs(e) => matches!(
                e,
                docsync_fs::Error::Io { .. } | docsync_fs::Error::LockFailed { .. }
            ),
            _ => false,
        }
    }
}
