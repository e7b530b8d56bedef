//! The persisted entity kinds: project pointer, head, branch, snapshot.
//!
//! All four are serialized whole as JSON at fixed store paths. None of them
//! embed blob content; blobs are stored separately, content-addressed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{BlobId, ProjectId, SnapshotId};
use crate::stage::DocumentKey;

/// Host-specific extension data carried on snapshots and branches.
///
/// Hosts may attach data the engine does not interpret (UI hints, audit
/// tags). Keeping it in an explicit typed map preserves unknown fields
/// across round-trips without resorting to structural duck-typing.
pub type AdditionalFields = BTreeMap<String, Value>;

/// One record in a snapshot's materialized tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Stable identity of the tracked record.
    pub key: DocumentKey,
    /// Display label. Included for humans reading diffs, not for identity.
    pub name: String,
    /// Content hash of the record at this snapshot.
    pub blob: BlobId,
}

impl StateEntry {
    pub fn new(key: impl Into<DocumentKey>, name: impl Into<String>, blob: BlobId) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            blob,
        }
    }
}

/// The complete materialized tree at a commit.
///
/// This is not a delta from the parent: every tracked key that existed at
/// commit time appears exactly once.
pub type SnapshotState = Vec<StateEntry>;

/// A commit: a full, deterministically-identified tree state plus lineage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    /// Parent snapshot, or [`SnapshotId::null()`] for the first commit on a branch.
    pub parent: SnapshotId,
    /// Commit message.
    pub name: String,
    pub description: String,
    /// Author account id. Empty until known; filled in when pushed.
    pub author: String,
    pub created: DateTime<Utc>,
    pub state: SnapshotState,
    /// Extension data the engine carries but never interprets.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_fields: AdditionalFields,
}

impl Snapshot {
    /// Look up a state entry by record key.
    pub fn state_entry(&self, key: &str) -> Option<&StateEntry> {
        self.state.iter().find(|entry| entry.key == key)
    }
}

/// A named, mutable pointer to an ordered list of snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Snapshot lineage, oldest first.
    pub snapshots: Vec<SnapshotId>,
    /// Extension data the engine carries but never interprets.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_fields: AdditionalFields,
}

impl Branch {
    /// Create an empty branch.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            created: now,
            modified: now,
            snapshots: Vec::new(),
            additional_fields: AdditionalFields::new(),
        }
    }

    /// The snapshot at the tip of this branch, if any.
    pub fn tip(&self) -> Option<&SnapshotId> {
        self.snapshots.last()
    }

    /// Returns `true` if the branch has no snapshots.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// The single pointer indicating which branch is checked out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Head {
    pub branch: String,
}

/// Associates local history with the external root entity it tracks.
///
/// Created on first use for a given root document and looked up by root id
/// thereafter. At most one pointer should exist per root id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPointer {
    pub id: ProjectId,
    pub name: String,
    pub root_document_id: String,
}

impl ProjectPointer {
    /// Create a pointer with a freshly generated project id.
    pub fn create(root_document_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ProjectId::generate(),
            name: name.into(),
            root_document_id: root_document_id.into(),
        }
    }
}
