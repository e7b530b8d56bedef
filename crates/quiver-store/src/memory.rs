use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreResult;
use crate::traits::ByteStore;

/// In-memory, HashMap-based byte store.
///
/// Intended for tests and embedding. Values are held behind a `RwLock` and
/// cloned on read.
pub struct InMemoryByteStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryByteStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored paths.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Remove everything from the store.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryByteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStore for InMemoryByteStore {
    fn get(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(path).cloned())
    }

    fn set(&self, path: &str, bytes: &[u8]) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, path: &str) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.remove(path);
        Ok(())
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let map = self.entries.read().expect("lock poisoned");
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        let mut matches: Vec<String> = map
            .keys()
            .filter(|path| path.starts_with(&dir))
            .cloned()
            .collect();
        matches.sort();
        Ok(matches)
    }

    fn has(&self, path: &str) -> StoreResult<bool> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.contains_key(path))
    }
}

impl std::fmt::Debug for InMemoryByteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryByteStore")
            .field("path_count", &self.len())
            .finish()
    }
}
