//! Results handed back to the caller.

use quiver_types::{Document, Stage};

/// The result of a status computation.
#[derive(Clone, Debug, PartialEq)]
pub struct Status {
    /// Stable digest of the whole status. Two statuses with the same key
    /// are identical; useful for UI memoization and for discarding stale
    /// renders.
    pub key: String,
    /// The current stage for the active project.
    pub stage: Stage,
    /// Changes not yet staged, including staged entries that have drifted
    /// further since staging.
    pub unstaged: Stage,
}

impl Status {
    /// Returns `true` if nothing is staged and nothing is pending.
    pub fn is_clean(&self) -> bool {
        self.stage.is_empty() && self.unstaged.is_empty()
    }
}

/// Blob contents the caller must apply to its document store after a
/// checkout, merge, pull, or rollback. Dirty candidates are excluded so
/// unsaved changes survive the operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateChangeset {
    /// Documents to insert or update, keyed by their own identity fields.
    pub upsert: Vec<Document>,
    /// Documents to remove.
    pub remove: Vec<Document>,
}

impl StateChangeset {
    /// Returns `true` if the caller has nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.remove.is_empty()
    }
}

/// What a push actually transferred.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PushResult {
    /// Snapshots appended to the remote branch.
    pub snapshots_pushed: usize,
    /// Blobs the remote was missing and received.
    pub blobs_pushed: usize,
}
