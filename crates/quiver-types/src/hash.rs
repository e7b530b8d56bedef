//! Canonical content hashing.
//!
//! Blob identity must not depend on the order a caller happened to insert
//! object keys, so values are serialized with object keys sorted at every
//! nesting level before hashing. The canonical string is kept alongside the
//! hash because it is exactly what gets persisted as the blob's bytes.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::id::BlobId;
use crate::stage::Document;

/// A canonical serialization paired with its content hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashedContent {
    /// BLAKE3 hash of `content`.
    pub id: BlobId,
    /// Canonical JSON serialization, object keys sorted.
    pub content: String,
}

/// Hash a document into its blob identity and canonical bytes.
pub fn hash_document(document: &Document) -> HashedContent {
    let content = canonicalize(document).to_string();
    HashedContent {
        id: BlobId::from_bytes(content.as_bytes()),
        content,
    }
}

/// Hash any serializable value into a stable id.
///
/// Used for composite keys such as the status key, where the input is an
/// ad-hoc structure rather than a tracked document.
pub fn hash_serializable<T: Serialize>(value: &T) -> Result<BlobId, TypeError> {
    let value = serde_json::to_value(value).map_err(|e| TypeError::Serialization(e.to_string()))?;
    let content = canonicalize(&value).to_string();
    Ok(BlobId::from_bytes(content.as_bytes()))
}

/// Rebuild a value with object keys sorted at every level.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_documents_hash_identically() {
        let a = json!({"id": "req_1", "url": "https://example.com"});
        let b = json!({"id": "req_1", "url": "https://example.com"});
        assert_eq!(hash_document(&a), hash_document(&b));
    }

    #[test]
    fn key_order_does_not_change_the_hash() {
        let a: Document = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let b: Document = serde_json::from_str(r#"{"a": 2, "b": 1}"#).unwrap();
        assert_eq!(hash_document(&a).id, hash_document(&b).id);
    }

    #[test]
    fn nested_objects_are_canonicalized() {
        let a: Document = serde_json::from_str(r#"{"outer": {"y": 1, "x": 2}}"#).unwrap();
        let b: Document = serde_json::from_str(r#"{"outer": {"x": 2, "y": 1}}"#).unwrap();
        assert_eq!(hash_document(&a).content, hash_document(&b).content);
    }

    #[test]
    fn array_order_is_preserved() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(hash_document(&a).id, hash_document(&b).id);
    }

    #[test]
    fn content_matches_the_hash() {
        let doc = json!({"name": "Foo"});
        let hashed = hash_document(&doc);
        assert_eq!(BlobId::from_bytes(hashed.content.as_bytes()), hashed.id);
    }

    #[test]
    fn scalars_hash() {
        assert_ne!(
            hash_document(&json!("a")).id,
            hash_document(&json!("b")).id
        );
        assert_eq!(hash_document(&json!(null)).content, "null");
    }

    #[test]
    fn hash_serializable_is_stable() {
        #[derive(Serialize)]
        struct Probe {
            b: u32,
            a: u32,
        }
        let one = hash_serializable(&Probe { b: 1, a: 2 }).unwrap();
        let two = hash_serializable(&Probe { b: 1, a: 2 }).unwrap();
        assert_eq!(one, two);
    }
}
