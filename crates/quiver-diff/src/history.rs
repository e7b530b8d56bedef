//! Lineage queries over branch snapshot lists.

use quiver_types::{Branch, SnapshotId};

/// The latest snapshot two branches share: the merge base.
///
/// Scans both histories from the tip, so diverged-at-the-end branches
/// resolve quickly. Returns `None` when the branches share no history.
pub fn root_snapshot_id(a: &Branch, b: &Branch) -> Option<SnapshotId> {
    shared_root(&a.snapshots, &b.snapshots)
}

fn shared_root(a: &[SnapshotId], b: &[SnapshotId]) -> Option<SnapshotId> {
    for own in a.iter().rev() {
        for theirs in b.iter().rev() {
            if own == theirs {
                return Some(*own);
            }
        }
    }
    None
}

/// How far two branches have diverged from their shared root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BranchComparison {
    /// Commits on `a` past the shared root.
    pub ahead: usize,
    /// Commits on `b` past the shared root.
    pub behind: usize,
}

/// Compare two branch histories. Either side may be absent (e.g. a branch
/// that does not exist on the remote yet), which counts as empty history.
pub fn compare_branches(a: Option<&Branch>, b: Option<&Branch>) -> BranchComparison {
    let snapshots_a = a.map(|branch| branch.snapshots.as_slice()).unwrap_or(&[]);
    let snapshots_b = b.map(|branch| branch.snapshots.as_slice()).unwrap_or(&[]);

    if snapshots_a.last() == snapshots_b.last() {
        return BranchComparison::default();
    }

    if snapshots_a.is_empty() {
        return BranchComparison {
            ahead: 0,
            behind: snapshots_b.len(),
        };
    }

    if snapshots_b.is_empty() {
        return BranchComparison {
            ahead: snapshots_a.len(),
            behind: 0,
        };
    }

    let Some(root) = shared_root(snapshots_a, snapshots_b) else {
        return BranchComparison::default();
    };

    let index_in_a = snapshots_a.iter().position(|id| *id == root).unwrap_or(0);
    let index_in_b = snapshots_b.iter().position(|id| *id == root).unwrap_or(0);

    BranchComparison {
        ahead: snapshots_a.len() - index_in_a - 1,
        behind: snapshots_b.len() - index_in_b - 1,
    }
}
