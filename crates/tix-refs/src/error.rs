//! Error types for reference operations.

use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// The ref or remote name is invalid.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A ref file exists but does not hold a valid target.
    #[error("corrupt ref {name}: {reason}")]
    Corrupt { name: String, reason: String },

    /// A lock protecting the store was poisoned.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
