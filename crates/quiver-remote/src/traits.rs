use async_trait::async_trait;

use quiver_types::{BlobId, Branch, ProjectId, ProjectPointer, Snapshot, SnapshotId};

use crate::error::RemoteResult;

/// A remote ledger of branches, snapshots, and blobs.
///
/// One method per logical wire call. Implementations own everything below
/// this line: transport, auth, retries, and the encryption of blob payloads
/// with the project symmetric key (including key exchange with team
/// members). Blob bytes cross this boundary in plaintext.
///
/// Failure of any call propagates as a terminal error, except listing
/// calls, which treat "not found" as an empty result.
#[async_trait]
pub trait RemoteHistory: Send + Sync {
    /// The remote project record, or `None` if the project was never pushed.
    async fn project(&self, id: &ProjectId) -> RemoteResult<Option<ProjectPointer>>;

    /// Create the remote project record. The remote may normalize the
    /// pointer (e.g. fill in server-side fields); the echo is authoritative.
    async fn create_project(&self, pointer: &ProjectPointer) -> RemoteResult<ProjectPointer>;

    /// Archive the remote project.
    async fn archive_project(&self, id: &ProjectId) -> RemoteResult<()>;

    /// All branches of a project. Unknown project means no branches.
    async fn branches(&self, project: &ProjectId) -> RemoteResult<Vec<Branch>>;

    /// One branch by name, or `None` if the remote does not have it.
    async fn branch(&self, project: &ProjectId, name: &str) -> RemoteResult<Option<Branch>>;

    /// Delete a remote branch.
    async fn remove_branch(&self, project: &ProjectId, name: &str) -> RemoteResult<()>;

    /// Fetch snapshots by id. Ids unknown to the remote are omitted from
    /// the result. Callers chunk requests at [`SNAPSHOT_CHUNK`].
    ///
    /// [`SNAPSHOT_CHUNK`]: crate::batch::SNAPSHOT_CHUNK
    async fn snapshots(
        &self,
        project: &ProjectId,
        ids: &[SnapshotId],
    ) -> RemoteResult<Vec<Snapshot>>;

    /// Append snapshots to a remote branch. Returns the server-normalized
    /// snapshots, which the caller should store back locally.
    async fn push_snapshots(
        &self,
        project: &ProjectId,
        branch: &str,
        snapshots: &[Snapshot],
    ) -> RemoteResult<Vec<Snapshot>>;

    /// Which of the given blob ids the remote does not have yet.
    async fn missing_blob_ids(
        &self,
        project: &ProjectId,
        ids: &[BlobId],
    ) -> RemoteResult<Vec<BlobId>>;

    /// Fetch blob payloads by id. Callers chunk requests at
    /// [`BLOB_FETCH_CHUNK`](crate::batch::BLOB_FETCH_CHUNK).
    async fn blobs(
        &self,
        project: &ProjectId,
        ids: &[BlobId],
    ) -> RemoteResult<Vec<(BlobId, Vec<u8>)>>;

    /// Upload blob payloads. Callers batch uploads with
    /// [`batch_blobs`](crate::batch::batch_blobs) to respect request-size
    /// limits.
    async fn push_blobs(
        &self,
        project: &ProjectId,
        blobs: &[(BlobId, Vec<u8>)],
    ) -> RemoteResult<()>;
}
