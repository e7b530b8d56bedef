//! The store path hierarchy.
//!
//! Every persisted entity lives under `projects/{projectId}`. These helpers
//! are the single source of truth for the layout; nothing else in the
//! workspace formats store paths by hand.

use quiver_types::{BlobId, ProjectId, SnapshotId};

/// Root of all project-scoped data.
pub fn projects() -> String {
    "projects".to_string()
}

/// Directory for one project.
pub fn project_root(project: &ProjectId) -> String {
    format!("projects/{project}")
}

/// The project pointer document.
pub fn project_meta(project: &ProjectId) -> String {
    format!("projects/{project}/meta")
}

/// The head pointer for a project.
pub fn head(project: &ProjectId) -> String {
    format!("projects/{project}/head")
}

/// Directory of branches for a project.
pub fn branches(project: &ProjectId) -> String {
    format!("projects/{project}/branches")
}

/// One branch. Branch names are stored lowercased so lookups are
/// case-insensitive.
pub fn branch(project: &ProjectId, name: &str) -> String {
    format!("projects/{project}/branches/{}", name.to_lowercase())
}

/// Directory of snapshots for a project.
pub fn snapshots(project: &ProjectId) -> String {
    format!("projects/{project}/snapshots")
}

/// One snapshot.
pub fn snapshot(project: &ProjectId, id: &SnapshotId) -> String {
    format!("projects/{project}/snapshots/{id}")
}

/// Directory of blobs for a project.
pub fn blobs(project: &ProjectId) -> String {
    format!("projects/{project}/blobs")
}

/// One blob.
pub fn blob(project: &ProjectId, id: &BlobId) -> String {
    format!("projects/{project}/blobs/{id}")
}
