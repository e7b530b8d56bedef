//! State deltas and stagable computation.

use std::collections::{BTreeMap, BTreeSet};

use quiver_types::hash::hash_document;
use quiver_types::{SnapshotState, StageEntry, StateEntry, StatusCandidate};

/// Index a state by record key.
pub fn state_map(state: &SnapshotState) -> BTreeMap<&str, &StateEntry> {
    state.iter().map(|entry| (entry.key.as_str(), entry)).collect()
}

/// Index candidates by record key.
pub fn candidate_map(candidates: &[StatusCandidate]) -> BTreeMap<&str, &StatusCandidate> {
    candidates
        .iter()
        .map(|candidate| (candidate.key.as_str(), candidate))
        .collect()
}

/// The key-wise difference between two states.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateDelta {
    /// Entries present only in the desired state.
    pub add: Vec<StateEntry>,
    /// Entries present in both but pointing at a different blob; the
    /// desired side is carried.
    pub update: Vec<StateEntry>,
    /// Entries present only in the base state.
    pub remove: Vec<StateEntry>,
}

impl StateDelta {
    /// Returns `true` if the two states were identical.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }

    /// Adds and updates together: everything the caller must write.
    pub fn upserts(&self) -> Vec<StateEntry> {
        let mut upserts = Vec::with_capacity(self.add.len() + self.update.len());
        upserts.extend(self.add.iter().cloned());
        upserts.extend(self.update.iter().cloned());
        upserts
    }
}

/// Compute the delta that turns `base` into `desired`.
pub fn state_delta(base: &SnapshotState, desired: &SnapshotState) -> StateDelta {
    let base_map = state_map(base);
    let desired_map = state_map(desired);
    let mut delta = StateDelta::default();

    let keys: BTreeSet<&str> = base_map.keys().chain(desired_map.keys()).copied().collect();

    for key in keys {
        match (base_map.get(key), desired_map.get(key)) {
            (None, Some(finish)) => delta.add.push((*finish).clone()),
            (Some(start), None) => delta.remove.push((*start).clone()),
            (Some(start), Some(finish)) if start.blob != finish.blob => {
                delta.update.push((*finish).clone());
            }
            _ => {}
        }
    }

    delta
}

/// What could be staged right now: one entry per candidate that differs
/// from the last snapshot.
///
/// A key present in the state but absent from the candidates yields a
/// `Deleted` entry; a key only in the candidates yields `Added`; a shared
/// key with a different blob id yields `Modified`. Unchanged keys produce
/// nothing. Previous content is left unset; attaching it requires blob
/// access, which belongs to the engine.
pub fn stagable(state: &SnapshotState, candidates: &[StatusCandidate]) -> Vec<StageEntry> {
    let entries = state_map(state);
    let candidates = candidate_map(candidates);
    let mut out = Vec::new();

    let keys: BTreeSet<&str> = entries.keys().chain(candidates.keys()).copied().collect();

    for key in keys {
        match (entries.get(key), candidates.get(key)) {
            (None, Some(candidate)) => {
                let hashed = hash_document(&candidate.document);
                out.push(StageEntry::Added {
                    key: candidate.key.clone(),
                    name: candidate.name.clone(),
                    blob_id: hashed.id,
                    blob_content: candidate.document.clone(),
                });
            }
            (Some(entry), None) => {
                out.push(StageEntry::Deleted {
                    key: entry.key.clone(),
                    name: entry.name.clone(),
                    blob_id: entry.blob,
                    previous_blob_content: None,
                });
            }
            (Some(entry), Some(candidate)) => {
                let hashed = hash_document(&candidate.document);
                if entry.blob != hashed.id {
                    out.push(StageEntry::Modified {
                        key: candidate.key.clone(),
                        name: candidate.name.clone(),
                        blob_id: hashed.id,
                        blob_content: candidate.document.clone(),
                        previous_blob_content: None,
                    });
                }
            }
            (None, None) => unreachable!("key came from one of the maps"),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_types::BlobId;
    use serde_json::json;

    fn entry(key: &str, content: &str) -> StateEntry {
        StateEntry::new(key, key.to_uppercase(), BlobId::from_bytes(content.as_bytes()))
    }

    fn candidate(key: &str, value: &str) -> StatusCandidate {
        StatusCandidate::new(key, key.to_uppercase(), json!({ "id": value }))
    }

    #[test]
    fn delta_of_identical_states_is_empty() {
        let state = vec![entry("a", "1"), entry("b", "2")];
        assert!(state_delta(&state, &state).is_empty());
    }

    #[test]
    fn delta_classifies_add_update_remove() {
        let base = vec![entry("keep", "1"), entry("change", "old"), entry("drop", "x")];
        let desired = vec![entry("keep", "1"), entry("change", "new"), entry("fresh", "y")];

        let delta = state_delta(&base, &desired);
        assert_eq!(delta.add, vec![entry("fresh", "y")]);
        assert_eq!(delta.update, vec![entry("change", "new")]);
        assert_eq!(delta.remove, vec![entry("drop", "x")]);
        assert_eq!(delta.upserts().len(), 2);
    }

    #[test]
    fn stagable_is_empty_when_nothing_changed() {
        let doc = json!({ "id": "v1" });
        let blob = quiver_types::hash::hash_document(&doc).id;
        let state = vec![StateEntry::new("a", "A", blob)];
        let candidates = vec![StatusCandidate::new("a", "A", doc)];
        assert!(stagable(&state, &candidates).is_empty());
    }

    #[test]
    fn stagable_detects_addition() {
        let out = stagable(&vec![], &[candidate("foo", "v1")]);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], StageEntry::Added { .. }));
        assert_eq!(out[0].key(), "foo");
    }

    #[test]
    fn stagable_detects_modification() {
        let old = json!({ "id": "v1" });
        let state = vec![StateEntry::new("a", "A", quiver_types::hash::hash_document(&old).id)];
        let out = stagable(&state, &[candidate("a", "v2")]);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], StageEntry::Modified { .. }));
    }

    #[test]
    fn stagable_detects_deletion() {
        let state = vec![entry("gone", "1")];
        let out = stagable(&state, &[]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_deleted());
        assert_eq!(*out[0].blob_id(), entry("gone", "1").blob);
    }

    #[test]
    fn stagable_mixes_all_operations() {
        let old = json!({ "id": "old" });
        let state = vec![
            StateEntry::new("mod", "MOD", quiver_types::hash::hash_document(&old).id),
            entry("del", "x"),
        ];
        let candidates = vec![candidate("mod", "new"), candidate("add", "v")];

        let out = stagable(&state, &candidates);
        assert_eq!(out.len(), 3);
        let keys: Vec<&str> = out.iter().map(StageEntry::key).collect();
        assert!(keys.contains(&"mod"));
        assert!(keys.contains(&"del"));
        assert!(keys.contains(&"add"));
    }
}
