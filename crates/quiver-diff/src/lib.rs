//! Diff and merge algorithms for Quiver.
//!
//! Everything here is a pure function over snapshot states, candidates, and
//! branches. No I/O, no store access: the engine loads entities and hands
//! them in, which keeps the interesting algorithms trivially testable.
//!
//! # Key Functions
//!
//! - [`state_delta`] -- key-wise add/update/remove between two states
//! - [`stagable`] -- what changed between the last snapshot and live candidates
//! - [`pre_merge_check`] -- which candidates are dirty or block a merge/checkout
//! - [`three_way_merge`] -- classic key-wise 3-way merge with conflict detection
//! - [`update_state_with_conflict_resolutions`] -- apply caller decisions
//! - [`root_snapshot_id`] / [`compare_branches`] -- lineage queries

pub mod delta;
pub mod history;
pub mod merge;

pub use delta::{stagable, state_delta, state_map, StateDelta};
pub use history::{compare_branches, root_snapshot_id, BranchComparison};
pub use merge::{
    pre_merge_check, three_way_merge, update_state_with_conflict_resolutions, Merged,
    PreMergeCheck,
};
