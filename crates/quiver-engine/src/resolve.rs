//! Caller-supplied conflict resolution.

use async_trait::async_trait;

use quiver_types::MergeConflict;

use crate::error::EngineResult;

/// Human-readable names for the two sides of a merge, for display in a
/// resolution UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeLabels {
    /// The trunk side ("mine").
    pub ours: String,
    /// The branch being merged in ("theirs").
    pub theirs: String,
}

/// Decides merge conflicts the engine cannot resolve on its own.
///
/// The engine hands over every conflict with its `choose` slot pre-seeded
/// with the "theirs" side; the resolver returns the same conflicts with
/// `choose` set to the winning blob, or `None` to delete the record. A
/// resolver that returns an error aborts the merge; if no resolver is
/// registered at all, a conflicting merge fails with
/// [`EngineError::MergeConflicts`](crate::EngineError::MergeConflicts).
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    async fn resolve(
        &self,
        conflicts: Vec<MergeConflict>,
        labels: MergeLabels,
    ) -> EngineResult<Vec<MergeConflict>>;
}

/// Resolver that keeps every conflict's pre-seeded choice (the "theirs"
/// side, or the surviving side for delete-versus-modify conflicts).
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptTheirs;

#[async_trait]
impl ConflictResolver for AcceptTheirs {
    async fn resolve(
        &self,
        conflicts: Vec<MergeConflict>,
        _labels: MergeLabels,
    ) -> EngineResult<Vec<MergeConflict>> {
        Ok(conflicts)
    }
}

/// Resolver that always takes the trunk side.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptOurs;

#[async_trait]
impl ConflictResolver for AcceptOurs {
    async fn resolve(
        &self,
        mut conflicts: Vec<MergeConflict>,
        _labels: MergeLabels,
    ) -> EngineResult<Vec<MergeConflict>> {
        for conflict in &mut conflicts {
            conflict.choose = conflict.mine_blob;
        }
        Ok(conflicts)
    }
}
