//! Pre-merge checks, the three-way merge, and conflict resolution.

use std::collections::{BTreeMap, BTreeSet};

use quiver_types::hash::hash_document;
use quiver_types::{MergeConflict, SnapshotState, StateEntry, StatusCandidate};

use crate::delta::state_map;

/// Result of checking live candidates against two merge endpoints.
#[derive(Clone, Debug, Default)]
pub struct PreMergeCheck {
    /// Candidates whose live content differs from both endpoints in a way
    /// that a merge or checkout would silently overwrite. These block the
    /// operation; the caller must commit or revert first.
    pub conflicts: Vec<StatusCandidate>,
    /// Candidates with unsaved changes that are safe to carry across the
    /// operation: they are excluded from the applied delta and left as-is.
    pub dirty: Vec<StatusCandidate>,
}

impl PreMergeCheck {
    /// Returns `true` if the operation may proceed.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Classify live candidates against the trunk and other branch tips.
///
/// A candidate not known to either endpoint is dirty (not yet under version
/// control). A candidate equal to either endpoint is fine. A candidate that
/// differs from both while the endpoints agree with each other is a safe
/// local edit, so it stays dirty. Everything else would be clobbered by the
/// merge and is reported as a conflict.
pub fn pre_merge_check(
    trunk_state: &SnapshotState,
    other_state: &SnapshotState,
    candidates: &[StatusCandidate],
) -> PreMergeCheck {
    let trunk = state_map(trunk_state);
    let other = state_map(other_state);
    let mut check = PreMergeCheck::default();

    for candidate in candidates {
        let key = candidate.key.as_str();
        let in_trunk = trunk.get(key);
        let in_other = other.get(key);

        if in_trunk.is_none() && in_other.is_none() {
            check.dirty.push(candidate.clone());
            continue;
        }

        let blob = hash_document(&candidate.document).id;

        if in_trunk.is_some_and(|entry| entry.blob == blob) {
            continue;
        }

        if in_other.is_some_and(|entry| entry.blob == blob) {
            continue;
        }

        if let (Some(t), Some(o)) = (in_trunk, in_other) {
            if t.blob == o.blob && blob != t.blob {
                check.dirty.push(candidate.clone());
                continue;
            }
        }

        check.conflicts.push(candidate.clone());
    }

    check
}

/// Result of a three-way merge.
#[derive(Clone, Debug, Default)]
pub struct Merged {
    /// The merged state. Conflicted keys carry the trunk's value (or the
    /// surviving side for delete-versus-modify) pending resolution.
    pub state: SnapshotState,
    /// Keys that changed incompatibly on both sides.
    pub conflicts: Vec<MergeConflict>,
}

/// Key-wise three-way merge of `trunk` and `other` against their common
/// ancestor `root`.
///
/// Unchanged-in-both keeps the record; changed-in-one takes the change;
/// changed-in-both to the same blob keeps it; changed-in-both to different
/// blobs emits a conflict. Deletions count as changes, so delete-versus-
/// modify also conflicts. Each conflict's `choose` slot is pre-seeded with
/// the "theirs" side (or the surviving side when one side deleted).
pub fn three_way_merge(
    root: &SnapshotState,
    trunk: &SnapshotState,
    other: &SnapshotState,
) -> Merged {
    let root_map = state_map(root);
    let trunk_map = state_map(trunk);
    let other_map = state_map(other);

    let keys: BTreeSet<&str> = root_map
        .keys()
        .chain(trunk_map.keys())
        .chain(other_map.keys())
        .copied()
        .collect();

    let mut merged = Merged::default();

    for key in keys {
        let root = root_map.get(key).copied();
        let trunk = trunk_map.get(key).copied();
        let other = other_map.get(key).copied();

        match (root, trunk, other) {
            // Gone from both sides, or never existed on either.
            (_, None, None) => {}

            // Added in trunk only.
            (None, Some(t), None) => merged.state.push(t.clone()),

            // Added in other only.
            (None, None, Some(o)) => merged.state.push(o.clone()),

            // Added independently in both.
            (None, Some(t), Some(o)) => {
                if t.blob != o.blob {
                    merged.conflicts.push(MergeConflict {
                        key: key.to_string(),
                        name: o.name.clone(),
                        message: "both added".into(),
                        mine_blob: Some(t.blob),
                        theirs_blob: Some(o.blob),
                        choose: Some(o.blob),
                    });
                }
                merged.state.push(t.clone());
            }

            // Deleted in trunk; other either left it alone or modified it.
            (Some(r), None, Some(o)) => {
                if o.blob != r.blob {
                    merged.conflicts.push(MergeConflict {
                        key: key.to_string(),
                        name: o.name.clone(),
                        message: "you deleted and they modified".into(),
                        mine_blob: None,
                        theirs_blob: Some(o.blob),
                        choose: Some(o.blob),
                    });
                    merged.state.push(o.clone());
                }
            }

            // Deleted in other; trunk either left it alone or modified it.
            (Some(r), Some(t), None) => {
                if t.blob != r.blob {
                    merged.conflicts.push(MergeConflict {
                        key: key.to_string(),
                        name: r.name.clone(),
                        message: "they deleted and you modified".into(),
                        mine_blob: Some(t.blob),
                        theirs_blob: None,
                        choose: Some(t.blob),
                    });
                    merged.state.push(t.clone());
                }
            }

            // Present everywhere: compare each side against the root.
            (Some(r), Some(t), Some(o)) => match (r.blob == t.blob, r.blob == o.blob) {
                // Unchanged in both.
                (true, true) => merged.state.push(t.clone()),
                // Modified in trunk only.
                (false, true) => merged.state.push(t.clone()),
                // Modified in other only.
                (true, false) => merged.state.push(o.clone()),
                // Modified in both.
                (false, false) => {
                    if t.blob != o.blob {
                        merged.conflicts.push(MergeConflict {
                            key: key.to_string(),
                            name: o.name.clone(),
                            message: "both modified".into(),
                            mine_blob: Some(t.blob),
                            theirs_blob: Some(o.blob),
                            choose: Some(o.blob),
                        });
                    }
                    merged.state.push(t.clone());
                }
            },
        }
    }

    merged
}

/// Apply caller-chosen resolutions back into a merged state.
///
/// For each resolution, `choose == Some(blob)` replaces (or inserts) the
/// record with that blob; `choose == None` removes the record.
pub fn update_state_with_conflict_resolutions(
    state: &SnapshotState,
    resolutions: &[MergeConflict],
) -> SnapshotState {
    let mut map: BTreeMap<String, StateEntry> = state
        .iter()
        .map(|entry| (entry.key.clone(), entry.clone()))
        .collect();

    for resolution in resolutions {
        match resolution.choose {
            Some(blob) => {
                let entry = map
                    .get(&resolution.key)
                    .map(|existing| StateEntry {
                        blob,
                        ..existing.clone()
                    })
                    .unwrap_or_else(|| {
                        StateEntry::new(resolution.key.clone(), resolution.name.clone(), blob)
                    });
                map.insert(resolution.key.clone(), entry);
            }
            None => {
                map.remove(&resolution.key);
            }
        }
    }

    map.into_values().collect()
}
