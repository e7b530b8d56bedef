//! Foundation types for Quiver.
//!
//! Quiver is an embedded version-control engine for API collection items.
//! This crate provides the identity, entity, and staging types used by every
//! other Quiver crate.
//!
//! # Key Types
//!
//! - [`BlobId`] — Content-addressed identifier for one record's bytes (BLAKE3 hash)
//! - [`SnapshotId`] — Deterministic commit identifier derived from project, parent, and state
//! - [`ProjectId`] — Identifier tying local history to a remote project record
//! - [`Snapshot`] / [`Branch`] / [`Head`] / [`ProjectPointer`] — The persisted entity kinds
//! - [`StageEntry`] / [`Stage`] — The in-memory working set of pending changes
//! - [`StatusCandidate`] — A caller-supplied live record to compare against history
//! - [`MergeConflict`] — An unresolvable three-way merge entry awaiting a caller decision

pub mod entity;
pub mod error;
pub mod hash;
pub mod id;
pub mod stage;

pub use entity::{
    AdditionalFields, Branch, Head, ProjectPointer, Snapshot, SnapshotState, StateEntry,
};
pub use error::TypeError;
pub use hash::{hash_document, hash_serializable, HashedContent};
pub use id::{BlobId, ProjectId, SnapshotId};
pub use stage::{Document, DocumentKey, MergeConflict, Stage, StageEntry, StatusCandidate};
