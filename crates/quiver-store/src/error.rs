use thiserror::Error;

/// Errors from byte store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path contains segments the store cannot address safely.
    #[error("invalid store path: {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
