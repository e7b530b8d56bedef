use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::traits::ByteStore;

/// Filesystem-backed byte store: one file per logical path under a root
/// directory.
///
/// Logical path segments map directly to directories and files, so the
/// on-disk tree mirrors the store layout. Writes create intermediate
/// directories as needed. Empty directories left behind by `remove` are not
/// cleaned up; `list` only reports files.
pub struct FsByteStore {
    root: PathBuf,
}

impl FsByteStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> StoreResult<PathBuf> {
        if path.is_empty() {
            return Err(StoreError::InvalidPath {
                path: path.to_string(),
                reason: "path must not be empty".into(),
            });
        }
        let mut resolved = self.root.clone();
        for segment in path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StoreError::InvalidPath {
                    path: path.to_string(),
                    reason: format!("segment not allowed: {segment:?}"),
                });
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }

    fn collect_files(&self, dir: &Path, out: &mut Vec<String>) -> StoreResult<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.collect_files(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let logical: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(logical.join("/"));
            }
        }
        Ok(())
    }
}

impl ByteStore for FsByteStore {
    fn get(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        let file = self.resolve(path)?;
        match fs::read(&file) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, path: &str, bytes: &[u8]) -> StoreResult<()> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file, bytes)?;
        Ok(())
    }

    fn remove(&self, path: &str) -> StoreResult<()> {
        let file = self.resolve(path)?;
        match fs::remove_file(&file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let dir = self.resolve(prefix)?;
        let mut out = Vec::new();
        self.collect_files(&dir, &mut out)?;
        out.sort();
        Ok(out)
    }

    fn has(&self, path: &str) -> StoreResult<bool> {
        Ok(self.resolve(path)?.is_file())
    }
}

impl std::fmt::Debug for FsByteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsByteStore").field("root", &self.root).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsByteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsByteStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn set_and_get_roundtrip() {
        let (_dir, store) = store();
        store.set("projects/p/blobs/abc", b"content").unwrap();
        assert_eq!(
            store.get("projects/p/blobs/abc").unwrap().unwrap(),
            b"content"
        );
    }

    #[test]
    fn get_missing_returns_none() {
        let (_dir, store) = store();
        assert!(store.get("projects/ghost/head").unwrap().is_none());
    }

    #[test]
    fn remove_missing_is_ok() {
        let (_dir, store) = store();
        store.remove("projects/p/head").unwrap();
    }

    #[test]
    fn list_walks_recursively() {
        let (_dir, store) = store();
        store.set("projects/p/branches/master", b"m").unwrap();
        store.set("projects/p/branches/dev", b"d").unwrap();
        store.set("projects/p/head", b"h").unwrap();

        let listed = store.list("projects/p/branches").unwrap();
        assert_eq!(
            listed,
            vec![
                "projects/p/branches/dev".to_string(),
                "projects/p/branches/master".to_string(),
            ]
        );

        let everything = store.list("projects").unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[test]
    fn list_missing_prefix_is_empty() {
        let (_dir, store) = store();
        assert!(store.list("projects/none").unwrap().is_empty());
    }

    #[test]
    fn rejects_traversal_segments() {
        let (_dir, store) = store();
        assert!(store.set("../escape", b"x").is_err());
        assert!(store.get("a//b").is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn overwrite_replaces_content() {
        let (_dir, store) = store();
        store.set("k", b"one").unwrap();
        store.set("k", b"two").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"two");
    }
}
