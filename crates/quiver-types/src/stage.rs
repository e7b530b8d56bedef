//! The stage: the working set of pending changes, plus the candidate and
//! conflict types that flow in and out of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::BlobId;

/// Stable identity of one tracked record.
pub type DocumentKey = String;

/// An opaque, externally-owned structured record. Quiver only ever
/// serializes it for hashing and storage.
pub type Document = serde_json::Value;

/// A caller-supplied live record the engine should compare against history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusCandidate {
    pub key: DocumentKey,
    pub name: String,
    pub document: Document,
}

impl StatusCandidate {
    pub fn new(key: impl Into<DocumentKey>, name: impl Into<String>, document: Document) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            document,
        }
    }
}

/// One pending change for a record key.
///
/// Created by status computation, promoted into the [`Stage`] by staging,
/// consumed and cleared by taking a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StageEntry {
    /// The key is new since the last snapshot.
    Added {
        key: DocumentKey,
        name: String,
        blob_id: BlobId,
        blob_content: Document,
    },
    /// The key exists in the last snapshot with different content.
    Modified {
        key: DocumentKey,
        name: String,
        blob_id: BlobId,
        blob_content: Document,
        /// Content at the last snapshot, when available, for display/undo.
        previous_blob_content: Option<Document>,
    },
    /// The key exists in the last snapshot but is gone from the candidates.
    Deleted {
        key: DocumentKey,
        name: String,
        /// The blob the last snapshot recorded for this key.
        blob_id: BlobId,
        previous_blob_content: Option<Document>,
    },
}

impl StageEntry {
    pub fn key(&self) -> &str {
        match self {
            StageEntry::Added { key, .. }
            | StageEntry::Modified { key, .. }
            | StageEntry::Deleted { key, .. } => key,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StageEntry::Added { name, .. }
            | StageEntry::Modified { name, .. }
            | StageEntry::Deleted { name, .. } => name,
        }
    }

    pub fn blob_id(&self) -> &BlobId {
        match self {
            StageEntry::Added { blob_id, .. }
            | StageEntry::Modified { blob_id, .. }
            | StageEntry::Deleted { blob_id, .. } => blob_id,
        }
    }

    /// The new content this entry carries. `None` for deletions.
    pub fn blob_content(&self) -> Option<&Document> {
        match self {
            StageEntry::Added { blob_content, .. }
            | StageEntry::Modified { blob_content, .. } => Some(blob_content),
            StageEntry::Deleted { .. } => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, StageEntry::Deleted { .. })
    }

    /// Attach the previous content to a modified or deleted entry.
    /// Added entries have no previous content and are returned unchanged.
    pub fn with_previous(mut self, previous: Option<Document>) -> Self {
        match &mut self {
            StageEntry::Modified {
                previous_blob_content,
                ..
            }
            | StageEntry::Deleted {
                previous_blob_content,
                ..
            } => *previous_blob_content = previous,
            StageEntry::Added { .. } => {}
        }
        self
    }
}

/// The working set of pending changes for one project, keyed by record.
///
/// Ordered so that serializing a stage (for the status key) is
/// deterministic.
pub type Stage = BTreeMap<DocumentKey, StageEntry>;

/// A three-way merge entry that changed incompatibly on both sides.
///
/// `choose` is the resolution slot: it is pre-seeded with the `theirs` side
/// and rewritten by the caller's resolver. `None` means "delete the record".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub key: DocumentKey,
    pub name: String,
    /// Human-readable description of how the conflict arose.
    pub message: String,
    /// The trunk side. `None` when trunk deleted the record.
    pub mine_blob: Option<BlobId>,
    /// The other side. `None` when the other branch deleted the record.
    pub theirs_blob: Option<BlobId>,
    /// The chosen resolution.
    pub choose: Option<BlobId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn added(key: &str) -> StageEntry {
        StageEntry::Added {
            key: key.into(),
            name: key.to_uppercase(),
            blob_id: BlobId::from_bytes(key.as_bytes()),
            blob_content: json!({ "id": key }),
        }
    }

    #[test]
    fn accessors_cover_all_variants() {
        let add = added("a");
        assert_eq!(add.key(), "a");
        assert_eq!(add.name(), "A");
        assert!(!add.is_deleted());
        assert!(add.blob_content().is_some());

        let del = StageEntry::Deleted {
            key: "b".into(),
            name: "B".into(),
            blob_id: BlobId::from_bytes(b"b"),
            previous_blob_content: None,
        };
        assert!(del.is_deleted());
        assert!(del.blob_content().is_none());
    }

    #[test]
    fn with_previous_only_applies_where_it_makes_sense() {
        let add = added("a").with_previous(Some(json!({"old": true})));
        assert!(matches!(add, StageEntry::Added { .. }));

        let modified = StageEntry::Modified {
            key: "m".into(),
            name: "M".into(),
            blob_id: BlobId::from_bytes(b"new"),
            blob_content: json!({"v": 2}),
            previous_blob_content: None,
        }
        .with_previous(Some(json!({"v": 1})));

        match modified {
            StageEntry::Modified {
                previous_blob_content,
                ..
            } => assert_eq!(previous_blob_content, Some(json!({"v": 1}))),
            other => panic!("expected Modified, got {other:?}"),
        }
    }

    #[test]
    fn stage_entry_serde_roundtrip() {
        let entry = added("roundtrip");
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: StageEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, parsed);
    }

    #[test]
    fn stage_iteration_is_key_ordered() {
        let mut stage = Stage::new();
        stage.insert("b".into(), added("b"));
        stage.insert("a".into(), added("a"));
        let keys: Vec<&str> = stage.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
