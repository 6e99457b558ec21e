//! Error types for docsync-content
//!
//! Conversion itself never fails (malformed input degrades to unmapped
//! blocks); these errors cover identifiers and serialization.

/// Result type for docsync-content operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in docsync-content operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid stable id: {value:?}")]
    InvalidStableId { value: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
