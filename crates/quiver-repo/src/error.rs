use quiver_types::{BlobId, SnapshotId};
use thiserror::Error;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The branch name fails validation. The message is display-ready.
    #[error(
        "Branch names must be at least 3 characters long and can only contain letters, numbers, - and _"
    )]
    InvalidBranchName { name: String },

    /// The branch does not exist.
    #[error("branch does not exist with name {0}")]
    BranchNotFound(String),

    /// The snapshot does not exist.
    #[error("failed to find snapshot id={0}")]
    SnapshotNotFound(SnapshotId),

    /// The blob does not exist.
    #[error("failed to find blob id={0}")]
    BlobNotFound(BlobId),

    /// No project pointer stored under the given id.
    #[error("failed to find project id={0}")]
    ProjectNotFound(String),

    /// More than one project pointer matched a root document.
    #[error("more than one project matched root document {0}")]
    AmbiguousProject(String),

    /// Serialization or deserialization failure.
    #[error("serialization error at {path}: {reason}")]
    Serialization { path: String, reason: String },

    /// Byte store failure.
    #[error("store error: {0}")]
    Store(#[from] quiver_store::StoreError),
}

/// Result alias for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;
