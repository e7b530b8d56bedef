use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use quiver_types::{BlobId, Branch, ProjectId, ProjectPointer, Snapshot, SnapshotId};

use crate::error::{RemoteError, RemoteResult};
use crate::traits::RemoteHistory;

#[derive(Default)]
struct Inner {
    projects: HashMap<ProjectId, ProjectPointer>,
    archived: Vec<ProjectId>,
    branches: HashMap<(ProjectId, String), Branch>,
    snapshots: HashMap<(ProjectId, SnapshotId), Snapshot>,
    blobs: HashMap<(ProjectId, BlobId), Vec<u8>>,
}

/// In-process remote for tests and embedding.
///
/// Behaves like the real history service at the protocol level: branches
/// advance when snapshots are pushed, blob storage is idempotent, and
/// lookups of unknown entities come back empty rather than failing.
pub struct InMemoryRemote {
    inner: RwLock<Inner>,
}

impl InMemoryRemote {
    /// Create an empty remote.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Number of blobs the remote holds for a project.
    pub fn blob_count(&self, project: &ProjectId) -> usize {
        let inner = self.inner.read().expect("lock poisoned");
        inner.blobs.keys().filter(|(p, _)| p == project).count()
    }

    /// Whether the project has been archived.
    pub fn is_archived(&self, project: &ProjectId) -> bool {
        let inner = self.inner.read().expect("lock poisoned");
        inner.archived.contains(project)
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteHistory for InMemoryRemote {
    async fn project(&self, id: &ProjectId) -> RemoteResult<Option<ProjectPointer>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.projects.get(id).cloned())
    }

    async fn create_project(&self, pointer: &ProjectPointer) -> RemoteResult<ProjectPointer> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.projects.insert(pointer.id.clone(), pointer.clone());
        Ok(pointer.clone())
    }

    async fn archive_project(&self, id: &ProjectId) -> RemoteResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        if inner.projects.remove(id).is_none() {
            return Err(RemoteError::NotFound {
                kind: "project",
                name: id.to_string(),
            });
        }
        inner.archived.push(id.clone());
        Ok(())
    }

    async fn branches(&self, project: &ProjectId) -> RemoteResult<Vec<Branch>> {
        let inner = self.inner.read().expect("lock poisoned");
        let mut branches: Vec<Branch> = inner
            .branches
            .iter()
            .filter(|((p, _), _)| p == project)
            .map(|(_, branch)| branch.clone())
            .collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }

    async fn branch(&self, project: &ProjectId, name: &str) -> RemoteResult<Option<Branch>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .branches
            .get(&(project.clone(), name.to_lowercase()))
            .cloned())
    }

    async fn remove_branch(&self, project: &ProjectId, name: &str) -> RemoteResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner
            .branches
            .remove(&(project.clone(), name.to_lowercase()));
        Ok(())
    }

    async fn snapshots(
        &self,
        project: &ProjectId,
        ids: &[SnapshotId],
    ) -> RemoteResult<Vec<Snapshot>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| inner.snapshots.get(&(project.clone(), *id)).cloned())
            .collect())
    }

    async fn push_snapshots(
        &self,
        project: &ProjectId,
        branch: &str,
        snapshots: &[Snapshot],
    ) -> RemoteResult<Vec<Snapshot>> {
        let mut inner = self.inner.write().expect("lock poisoned");

        for snapshot in snapshots {
            inner
                .snapshots
                .insert((project.clone(), snapshot.id), snapshot.clone());
        }

        let key = (project.clone(), branch.to_lowercase());
        let entry = inner
            .branches
            .entry(key)
            .or_insert_with(|| Branch::new(branch));
        for snapshot in snapshots {
            if !entry.snapshots.contains(&snapshot.id) {
                entry.snapshots.push(snapshot.id);
            }
        }

        Ok(snapshots.to_vec())
    }

    async fn missing_blob_ids(
        &self,
        project: &ProjectId,
        ids: &[BlobId],
    ) -> RemoteResult<Vec<BlobId>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(ids
            .iter()
            .filter(|id| !inner.blobs.contains_key(&(project.clone(), **id)))
            .copied()
            .collect())
    }

    async fn blobs(
        &self,
        project: &ProjectId,
        ids: &[BlobId],
    ) -> RemoteResult<Vec<(BlobId, Vec<u8>)>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| {
                inner
                    .blobs
                    .get(&(project.clone(), *id))
                    .map(|bytes| (*id, bytes.clone()))
            })
            .collect())
    }

    async fn push_blobs(
        &self,
        project: &ProjectId,
        blobs: &[(BlobId, Vec<u8>)],
    ) -> RemoteResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        for (id, bytes) in blobs {
            inner
                .blobs
                .entry((project.clone(), *id))
                .or_insert_with(|| bytes.clone());
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().expect("lock poisoned");
        f.debug_struct("InMemoryRemote")
            .field("projects", &inner.projects.len())
            .field("branches", &inner.branches.len())
            .field("snapshots", &inner.snapshots.len())
            .field("blobs", &inner.blobs.len())
            .finish()
    }
}
