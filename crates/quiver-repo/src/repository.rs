//! CRUD over the byte store for the five persisted entity kinds.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use quiver_store::{paths, ByteStore};
use quiver_types::hash::hash_document;
use quiver_types::{
    BlobId, Branch, Document, Head, ProjectId, ProjectPointer, Snapshot, SnapshotId,
};

use crate::error::{RepoError, RepoResult};
use crate::names::validate_branch_name;

/// The default branch. Exists once a project is initialized and can never
/// be deleted.
pub const DEFAULT_BRANCH: &str = "master";

/// JSON-over-ByteStore persistence for projects, heads, branches,
/// snapshots, and blobs.
///
/// Blobs are written once and never rewritten: their path is derived from
/// their content hash, so an existing blob is already correct.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn ByteStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn ByteStore>) -> Self {
        Self { store }
    }

    fn read_json<T: DeserializeOwned>(&self, path: &str) -> RepoResult<Option<T>> {
        let Some(bytes) = self.store.get(path)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).map_err(|e| RepoError::Serialization {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(value))
    }

    fn write_json<T: Serialize>(&self, path: &str, value: &T) -> RepoResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| RepoError::Serialization {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        self.store.set(path, &bytes)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Project pointers
    // ---------------------------------------------------------------

    pub fn store_project(&self, pointer: &ProjectPointer) -> RepoResult<()> {
        self.write_json(&paths::project_meta(&pointer.id), pointer)
    }

    pub fn project(&self, id: &ProjectId) -> RepoResult<Option<ProjectPointer>> {
        self.read_json(&paths::project_meta(id))
    }

    /// All locally-known project pointers. Project directories whose meta
    /// document is missing are skipped.
    pub fn all_projects(&self) -> RepoResult<Vec<ProjectPointer>> {
        let mut projects = Vec::new();
        for path in self.store.list(&paths::projects())? {
            // Only `projects/{id}/meta` is a pointer; deeper paths (heads,
            // branches, snapshots, blobs) are other entity kinds.
            let segments: Vec<&str> = path.split('/').collect();
            if segments.len() != 3 || segments[2] != "meta" {
                continue;
            }
            if let Some(pointer) = self.read_json::<ProjectPointer>(&path)? {
                projects.push(pointer);
            }
        }
        Ok(projects)
    }

    /// Remove a project pointer. History under the project is left behind;
    /// without its pointer it is unreachable.
    pub fn remove_project(&self, id: &ProjectId) -> RepoResult<()> {
        debug!(project = %id, "removing local project pointer");
        self.store.remove(&paths::project_meta(id))?;
        Ok(())
    }

    /// Find the project pointer for a root document.
    ///
    /// At most one pointer should exist per root. When duplicates are
    /// found, pointers whose branches hold no snapshots are considered
    /// stale and pruned before deciding; if more than one active pointer
    /// remains the lookup fails rather than guessing.
    pub fn project_by_root_document(&self, root_id: &str) -> RepoResult<Option<ProjectPointer>> {
        let mut matched: Vec<ProjectPointer> = self
            .all_projects()?
            .into_iter()
            .filter(|pointer| pointer.root_document_id == root_id)
            .collect();

        if matched.len() > 1 {
            let mut kept = Vec::new();
            for pointer in matched {
                let branches = self.branches(&pointer.id)?;
                if branches.iter().any(|branch| !branch.snapshots.is_empty()) {
                    kept.push(pointer);
                } else {
                    warn!(project = %pointer.id, root = root_id, "pruning inactive duplicate project");
                    self.remove_project(&pointer.id)?;
                }
            }
            matched = kept;
        }

        if matched.len() > 1 {
            return Err(RepoError::AmbiguousProject(root_id.to_string()));
        }

        Ok(matched.into_iter().next())
    }

    // ---------------------------------------------------------------
    // Head
    // ---------------------------------------------------------------

    /// The checked-out branch for a project, defaulting to `master`.
    /// The default is persisted on first read so the project is considered
    /// initialized from then on.
    pub fn head(&self, project: &ProjectId) -> RepoResult<Head> {
        if let Some(head) = self.read_json(&paths::head(project))? {
            return Ok(head);
        }
        let head = Head {
            branch: DEFAULT_BRANCH.to_string(),
        };
        self.store_head(project, &head)?;
        Ok(head)
    }

    pub fn store_head(&self, project: &ProjectId, head: &Head) -> RepoResult<()> {
        self.write_json(&paths::head(project), head)
    }

    // ---------------------------------------------------------------
    // Branches
    // ---------------------------------------------------------------

    /// Look up a branch. Names are matched case-insensitively because
    /// branches are stored under their lowercased name.
    pub fn branch(&self, project: &ProjectId, name: &str) -> RepoResult<Option<Branch>> {
        self.read_json(&paths::branch(project, name))
    }

    pub fn require_branch(&self, project: &ProjectId, name: &str) -> RepoResult<Branch> {
        self.branch(project, name)?
            .ok_or_else(|| RepoError::BranchNotFound(name.to_string()))
    }

    pub fn get_or_create_branch(&self, project: &ProjectId, name: &str) -> RepoResult<Branch> {
        if let Some(branch) = self.branch(project, name)? {
            return Ok(branch);
        }
        let mut branch = Branch::new(name);
        self.store_branch(project, &mut branch)?;
        Ok(branch)
    }

    /// Persist a branch, validating its name and refreshing its modified
    /// stamp.
    pub fn store_branch(&self, project: &ProjectId, branch: &mut Branch) -> RepoResult<()> {
        validate_branch_name(&branch.name)?;
        branch.modified = chrono::Utc::now();
        self.write_json(&paths::branch(project, &branch.name), branch)
    }

    pub fn remove_branch(&self, project: &ProjectId, name: &str) -> RepoResult<()> {
        self.store.remove(&paths::branch(project, name))?;
        Ok(())
    }

    pub fn branches(&self, project: &ProjectId) -> RepoResult<Vec<Branch>> {
        let mut branches = Vec::new();
        for path in self.store.list(&paths::branches(project))? {
            if let Some(branch) = self.read_json::<Branch>(&path)? {
                branches.push(branch);
            }
        }
        Ok(branches)
    }

    // ---------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------

    pub fn snapshot(&self, project: &ProjectId, id: &SnapshotId) -> RepoResult<Option<Snapshot>> {
        self.read_json(&paths::snapshot(project, id))
    }

    pub fn require_snapshot(&self, project: &ProjectId, id: &SnapshotId) -> RepoResult<Snapshot> {
        self.snapshot(project, id)?
            .ok_or(RepoError::SnapshotNotFound(*id))
    }

    pub fn store_snapshot(&self, project: &ProjectId, snapshot: &Snapshot) -> RepoResult<()> {
        self.write_json(&paths::snapshot(project, &snapshot.id), snapshot)
    }

    pub fn store_snapshots(&self, project: &ProjectId, snapshots: &[Snapshot]) -> RepoResult<()> {
        for snapshot in snapshots {
            self.store_snapshot(project, snapshot)?;
        }
        Ok(())
    }

    /// The snapshot at a branch's tip, or `None` for an empty branch.
    /// A tip id with no stored snapshot is corruption and errors.
    pub fn latest_snapshot(
        &self,
        project: &ProjectId,
        branch: &Branch,
    ) -> RepoResult<Option<Snapshot>> {
        match branch.tip() {
            None => Ok(None),
            Some(tip) => Ok(Some(self.require_snapshot(project, tip)?)),
        }
    }

    // ---------------------------------------------------------------
    // Blobs
    // ---------------------------------------------------------------

    /// Store a document as a content-addressed blob and return its id.
    /// Re-storing existing content is a no-op.
    pub fn store_document(&self, project: &ProjectId, document: &Document) -> RepoResult<BlobId> {
        let hashed = hash_document(document);
        self.store_blob_bytes(project, &hashed.id, hashed.content.as_bytes())?;
        Ok(hashed.id)
    }

    /// Store raw blob bytes under a known id (used when mirroring blobs
    /// fetched from the remote). Write-once.
    pub fn store_blob_bytes(
        &self,
        project: &ProjectId,
        id: &BlobId,
        bytes: &[u8],
    ) -> RepoResult<()> {
        let path = paths::blob(project, id);
        if self.store.has(&path)? {
            return Ok(());
        }
        self.store.set(&path, bytes)?;
        Ok(())
    }

    pub fn blob_bytes(&self, project: &ProjectId, id: &BlobId) -> RepoResult<Option<Vec<u8>>> {
        Ok(self.store.get(&paths::blob(project, id))?)
    }

    pub fn blob_document(&self, project: &ProjectId, id: &BlobId) -> RepoResult<Option<Document>> {
        self.read_json(&paths::blob(project, id))
    }

    pub fn require_document(&self, project: &ProjectId, id: &BlobId) -> RepoResult<Document> {
        self.blob_document(project, id)?
            .ok_or(RepoError::BlobNotFound(*id))
    }

    /// Load documents for a list of blob ids, failing on the first missing
    /// blob.
    pub fn documents(&self, project: &ProjectId, ids: &[BlobId]) -> RepoResult<Vec<Document>> {
        ids.iter()
            .map(|id| self.require_document(project, id))
            .collect()
    }

    pub fn has_blob(&self, project: &ProjectId, id: &BlobId) -> RepoResult<bool> {
        Ok(self.store.has(&paths::blob(project, id))?)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}
