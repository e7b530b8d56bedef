use quiver_remote::RemoteError;
use quiver_repo::RepoError;
use quiver_store::StoreError;
use quiver_types::{MergeConflict, TypeError};
use thiserror::Error;

/// Errors from engine operations.
///
/// Validation and conflict messages are display-ready. No operation
/// partially commits: an error means local state is as it was before the
/// call, except where a conflict handler already ran.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No project is active on this engine instance.
    #[error("no active project")]
    NoActiveProject,

    /// A remote operation was requested but no remote client is configured.
    #[error("no remote history client configured")]
    RemoteNotConfigured,

    /// A caller-supplied argument failed validation.
    #[error("{0}")]
    Validation(String),

    /// The branch does not exist.
    #[error("branch does not exist with name {0}")]
    BranchNotFound(String),

    /// A branch with this name already exists.
    #[error("branch already exists by name {0}")]
    BranchExists(String),

    /// The default branch can never be deleted.
    #[error("Cannot delete the default branch")]
    CannotDeleteDefaultBranch,

    /// The checked-out branch cannot be deleted.
    #[error("Cannot delete the currently-checked-out branch")]
    CannotDeleteCurrentBranch,

    /// The branch has no snapshots to operate on.
    #[error("Branch has no snapshots yet")]
    NoSnapshots,

    /// Candidates with unsaved changes block the operation.
    #[error("{0}")]
    DirtyCandidates(String),

    /// A three-way merge produced conflicts and no resolver is registered.
    #[error("unresolved merge conflicts: {}", conflict_keys(.0))]
    MergeConflicts(Vec<MergeConflict>),

    /// The local branch history is not a prefix-extension of the remote's.
    #[error("Remote history conflict. Please pull latest changes and try again")]
    RemoteHistoryDiverged,

    /// There is nothing to push.
    #[error("Already up to date")]
    AlreadyUpToDate,

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

fn conflict_keys(conflicts: &[MergeConflict]) -> String {
    conflicts
        .iter()
        .map(|conflict| conflict.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
