use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::SnapshotState;
use crate::error::TypeError;

/// Content-addressed identifier for a blob.
///
/// A `BlobId` is the BLAKE3 hash of a record's canonical serialization.
/// Identical content always produces the same `BlobId`, so blobs deduplicate
/// across keys and snapshots and a stored blob never needs rewriting.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobId([u8; 32]);

impl BlobId {
    /// Compute a `BlobId` from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create a `BlobId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The null blob ID (all zeros). Represents "no blob".
    pub const fn null() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if this is the null blob ID.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        Ok(Self(decode_hex32(s)?))
    }
}

impl fmt::Debug for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobId({})", self.short_hex())
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for BlobId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Deterministic identifier for a snapshot (a commit).
///
/// Derived from the project ID, the parent snapshot ID, and the sorted blob
/// IDs of the snapshot's state. Committing the same state under the same
/// parent and project always yields the same `SnapshotId`, which makes
/// commits idempotent and retries safe.
///
/// Keys and display names are intentionally excluded from the hash so that
/// renaming a record does not change snapshot identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotId([u8; 32]);

impl SnapshotId {
    /// Compute the snapshot ID for `state` committed under `parent` in `project`.
    pub fn compute(project: &ProjectId, parent: &SnapshotId, state: &SnapshotState) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(project.as_str().as_bytes());
        hasher.update(&parent.0);

        let mut blobs: Vec<&BlobId> = state.iter().map(|entry| &entry.blob).collect();
        blobs.sort();

        for blob in blobs {
            hasher.update(blob.as_bytes());
        }

        Self(*hasher.finalize().as_bytes())
    }

    /// Create a `SnapshotId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The null snapshot ID. Used as the parent of the first commit on a branch.
    pub const fn null() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if this is the null snapshot ID.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        Ok(Self(decode_hex32(s)?))
    }
}

impl fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotId({})", self.short_hex())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Identifier for a Quiver project.
///
/// A project ties local history to the remote project record that mirrors
/// it. IDs are generated once and travel with the project pointer; they are
/// strings rather than hashes because the remote allocates and echoes them.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a project ID from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh project ID.
    pub fn generate() -> Self {
        Self(format!("prj_{}", uuid::Uuid::now_v7().simple()))
    }

    /// The ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectId({})", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

fn decode_hex32(s: &str) -> Result<[u8; 32], TypeError> {
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(TypeError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::StateEntry;

    fn entry(key: &str, blob: BlobId) -> StateEntry {
        StateEntry {
            key: key.to_string(),
            name: key.to_uppercase(),
            blob,
        }
    }

    #[test]
    fn blob_id_is_deterministic() {
        let a = BlobId::from_bytes(b"hello world");
        let b = BlobId::from_bytes(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_produces_different_blob_ids() {
        assert_ne!(BlobId::from_bytes(b"a"), BlobId::from_bytes(b"b"));
    }

    #[test]
    fn null_blob_id_is_all_zeros() {
        assert!(BlobId::null().is_null());
        assert_eq!(BlobId::null().as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn blob_id_hex_roundtrip() {
        let id = BlobId::from_bytes(b"roundtrip");
        assert_eq!(BlobId::from_hex(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn blob_id_from_hex_rejects_bad_input() {
        assert!(BlobId::from_hex("zzzz").is_err());
        assert!(BlobId::from_hex("abcd").is_err()); // too short
    }

    #[test]
    fn snapshot_id_is_deterministic() {
        let project = ProjectId::new("prj_1");
        let parent = SnapshotId::null();
        let state = vec![entry("a", BlobId::from_bytes(b"1"))];
        let id1 = SnapshotId::compute(&project, &parent, &state);
        let id2 = SnapshotId::compute(&project, &parent, &state);
        assert_eq!(id1, id2);
    }

    #[test]
    fn snapshot_id_ignores_state_order() {
        let project = ProjectId::new("prj_1");
        let parent = SnapshotId::null();
        let a = entry("a", BlobId::from_bytes(b"1"));
        let b = entry("b", BlobId::from_bytes(b"2"));
        let id1 = SnapshotId::compute(&project, &parent, &vec![a.clone(), b.clone()]);
        let id2 = SnapshotId::compute(&project, &parent, &vec![b, a]);
        assert_eq!(id1, id2);
    }

    #[test]
    fn snapshot_id_depends_on_parent_and_project() {
        let state = vec![entry("a", BlobId::from_bytes(b"1"))];
        let base = SnapshotId::compute(&ProjectId::new("prj_1"), &SnapshotId::null(), &state);
        let other_parent = SnapshotId::compute(
            &ProjectId::new("prj_1"),
            &SnapshotId::from_hash([7; 32]),
            &state,
        );
        let other_project = SnapshotId::compute(&ProjectId::new("prj_2"), &SnapshotId::null(), &state);
        assert_ne!(base, other_parent);
        assert_ne!(base, other_project);
    }

    #[test]
    fn project_id_generation_is_unique() {
        let a = ProjectId::generate();
        let b = ProjectId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("prj_"));
    }

    #[test]
    fn display_is_full_hex() {
        let id = BlobId::from_bytes(b"display");
        assert_eq!(format!("{id}").len(), 64);
    }
}
