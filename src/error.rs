//! Error types for issuedeck.
//!
//! The store failing to open is the one fatal condition: callers are
//! expected to abort startup on it. Everything else is either a typed
//! domain error or degraded at the coordinator layer (reads fall back
//! to empty results, commits retry on the next trigger).

use thiserror::Error;

/// Result type alias for issuedeck operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the data layer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Issue not found: {id}")]
    IssueNotFound { id: String },

    #[error("Tag not found: {id}")]
    TagNotFound { id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error identifies a missing record rather than a
    /// store failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::IssueNotFound { .. } | Self::TagNotFound { .. })
    }
}
