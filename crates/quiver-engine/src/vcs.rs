//! The stateful VCS façade.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use quiver_diff::{
    compare_branches, pre_merge_check, root_snapshot_id, stagable, state_delta, state_map,
    three_way_merge, update_state_with_conflict_resolutions, BranchComparison,
};
use quiver_remote::{batch_blobs, RemoteHistory, BLOB_FETCH_CHUNK, SNAPSHOT_CHUNK};
use quiver_repo::{validate_branch_name, RepoError, Repository, DEFAULT_BRANCH};
use quiver_store::ByteStore;
use quiver_types::hash::{hash_document, hash_serializable};
use quiver_types::{
    BlobId, Branch, Document, Head, MergeConflict, ProjectId, ProjectPointer, Snapshot,
    SnapshotId, SnapshotState, Stage, StageEntry, StateEntry, StatusCandidate,
};

use crate::error::{EngineError, EngineResult};
use crate::resolve::{ConflictResolver, MergeLabels};
use crate::types::{PushResult, StateChangeset, Status};

/// Whose snapshot lineage the trunk keeps when a merge creates a snapshot.
///
/// A local merge keeps the trunk's own history. A pull adopts the remote's
/// lineage, so that afterwards local history matches the remote exactly
/// when no true divergence existed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MergeLineage {
    Trunk,
    Other,
}

/// The Quiver version-control engine.
///
/// One instance per logical session. The engine owns the per-project stage
/// (the only true in-memory state) and the identity of the active project;
/// everything else lives in the byte store behind [`Repository`].
///
/// Mutating operations take `&mut self` and must not be overlapped across
/// clones of the underlying store; read-only operations (`status`,
/// `get_history`, `get_branches`, ...) may interleave freely.
pub struct Vcs {
    repo: Repository,
    remote: Option<Arc<dyn RemoteHistory>>,
    resolver: Option<Arc<dyn ConflictResolver>>,
    project: Option<ProjectPointer>,
    /// Stage per project. Never persisted: it is a working set, analogous
    /// to a git index kept in memory.
    stages: HashMap<ProjectId, Stage>,
    /// Author id stamped onto snapshots when they are pushed.
    author: String,
}

impl Vcs {
    /// Create an engine over a byte store, with no remote and no conflict
    /// resolver.
    pub fn new(store: Arc<dyn ByteStore>) -> Self {
        Self {
            repo: Repository::new(store),
            remote: None,
            resolver: None,
            project: None,
            stages: HashMap::new(),
            author: String::new(),
        }
    }

    /// Attach a remote history client, enabling push/pull.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteHistory>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Attach a conflict resolver. Without one, conflicting merges fail.
    pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the author id stamped onto snapshots at push time.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// The repository this engine persists through.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // ---------------------------------------------------------------
    // Project lifecycle
    // ---------------------------------------------------------------

    /// Activate a project pointer, persisting it if it is not stored yet.
    /// Activation initializes the project: the head and the default branch
    /// exist from here on.
    pub fn set_project(&mut self, pointer: ProjectPointer) -> EngineResult<()> {
        self.repo.store_project(&pointer)?;
        let head = self.repo.head(&pointer.id)?;
        self.repo.get_or_create_branch(&pointer.id, &head.branch)?;
        info!(project = %pointer.id, "activated project");
        self.project = Some(pointer);
        Ok(())
    }

    /// Activate the project tracking `root_document_id`, or deactivate if
    /// none exists.
    pub fn switch_project(&mut self, root_document_id: &str) -> EngineResult<()> {
        match self.repo.project_by_root_document(root_document_id)? {
            Some(pointer) => self.set_project(pointer),
            None => {
                self.project = None;
                Ok(())
            }
        }
    }

    /// Idempotent lookup-or-create of the project for a root document;
    /// activates it. A no-op when already active for that root.
    pub fn switch_and_create_project_if_not_exist(
        &mut self,
        root_document_id: &str,
        name: &str,
    ) -> EngineResult<()> {
        let pointer = match self.repo.project_by_root_document(root_document_id)? {
            Some(pointer) => pointer,
            None => {
                let pointer = ProjectPointer::create(root_document_id, name);
                self.repo.store_project(&pointer)?;
                info!(project = %pointer.id, root = root_document_id, "created project");
                pointer
            }
        };
        self.set_project(pointer)
    }

    /// Whether a project is active on this instance.
    pub fn has_project(&self) -> bool {
        self.project.is_some()
    }

    /// The active project pointer, if any.
    pub fn active_project(&self) -> Option<&ProjectPointer> {
        self.project.as_ref()
    }

    /// Deactivate without touching stored state.
    pub fn clear_project(&mut self) {
        self.project = None;
    }

    /// All locally-known project pointers.
    pub fn local_projects(&self) -> EngineResult<Vec<ProjectPointer>> {
        Ok(self.repo.all_projects()?)
    }

    /// Remove every local project pointer tracking `root_document_id`.
    pub fn remove_projects_for_root(&mut self, root_document_id: &str) -> EngineResult<()> {
        for pointer in self.repo.all_projects()? {
            if pointer.root_document_id != root_document_id {
                continue;
            }
            self.repo.remove_project(&pointer.id)?;
            self.stages.remove(&pointer.id);
            if self.project.as_ref().is_some_and(|p| p.id == pointer.id) {
                self.project = None;
            }
        }
        Ok(())
    }

    /// Archive the remote project and drop the local pointer.
    pub async fn archive_project(&mut self) -> EngineResult<()> {
        let remote = self.require_remote()?;
        let project = self.project_id()?.clone();
        remote.archive_project(&project).await?;
        self.repo.remove_project(&project)?;
        self.stages.remove(&project);
        self.project = None;
        info!(project = %project, "archived project");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Status and staging
    // ---------------------------------------------------------------

    /// Diff live candidates against the last snapshot and the stage.
    ///
    /// `unstaged` holds everything stagable that is not already staged at
    /// the same content, including staged entries that drifted further
    /// since staging. Modified and deleted entries carry the content they
    /// had at the last snapshot.
    pub fn status(&self, candidates: &[StatusCandidate]) -> EngineResult<Status> {
        let project = self.project_id()?.clone();
        let branch = self.current_branch()?;
        let state = self.tip_state(&project, &branch)?;
        let stage = self.stages.get(&project).cloned().unwrap_or_default();

        let last_entries = state_map(&state);
        let mut unstaged = Stage::new();

        for entry in stagable(&state, candidates) {
            let already_staged = stage
                .get(entry.key())
                .is_some_and(|staged| staged.blob_id() == entry.blob_id());
            if already_staged {
                continue;
            }

            let previous = last_entries
                .get(entry.key())
                .map(|last| self.repo.blob_document(&project, &last.blob))
                .transpose()?
                .flatten();

            unstaged.insert(entry.key().to_string(), entry.with_previous(previous));
        }

        let digest = hash_serializable(&serde_json::json!({
            "stage": &stage,
            "unstaged": &unstaged,
        }))?;

        Ok(Status {
            key: digest.to_hex(),
            stage,
            unstaged,
        })
    }

    /// Move entries onto the stage, persisting their blobs
    /// (content-addressed, write-once). Returns the updated stage.
    pub fn stage(&mut self, entries: &[StageEntry]) -> EngineResult<Stage> {
        let project = self.project_id()?.clone();

        for entry in entries {
            if let Some(content) = entry.blob_content() {
                self.repo.store_document(&project, content)?;
            }
        }

        let stage = self.stages.entry(project).or_default();
        for entry in entries {
            stage.insert(entry.key().to_string(), entry.clone());
        }
        debug!(count = entries.len(), "staged entries");
        Ok(stage.clone())
    }

    /// Remove entries from the stage. Returns the updated stage.
    pub fn unstage(&mut self, entries: &[StageEntry]) -> EngineResult<Stage> {
        let project = self.project_id()?.clone();
        let stage = self.stages.entry(project).or_default();
        for entry in entries {
            stage.remove(entry.key());
        }
        debug!(count = entries.len(), "unstaged entries");
        Ok(stage.clone())
    }

    // ---------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------

    /// Fold the stage into a new snapshot on the current branch.
    ///
    /// The new state is the parent state minus every staged key, plus the
    /// staged non-deleted entries. Fails on a blank message or an empty
    /// stage. Clears the stage on success.
    pub fn take_snapshot(&mut self, name: &str) -> EngineResult<Snapshot> {
        if name.trim().is_empty() {
            return Err(EngineError::Validation("Snapshot must have a message".into()));
        }

        let project = self.project_id()?.clone();
        let stage = self.stages.get(&project).cloned().unwrap_or_default();
        if stage.is_empty() {
            return Err(EngineError::Validation(
                "Snapshot does not have any changes".into(),
            ));
        }

        let mut branch = self.current_branch()?;
        let parent = self.repo.latest_snapshot(&project, &branch)?;

        let mut new_state: SnapshotState = Vec::new();
        if let Some(parent) = &parent {
            for entry in &parent.state {
                // Staged keys are replaced below; this also drops deletions.
                if stage.contains_key(&entry.key) {
                    continue;
                }
                new_state.push(entry.clone());
            }
        }
        for entry in stage.values() {
            if entry.is_deleted() {
                continue;
            }
            new_state.push(StateEntry::new(entry.key(), entry.name(), *entry.blob_id()));
        }

        let snapshot = self.commit_state(&project, &mut branch, new_state, name)?;
        self.stages.remove(&project);
        Ok(snapshot)
    }

    /// History of the current branch, oldest first. `count == 0` means all;
    /// otherwise the most recent `count` snapshots.
    pub fn get_history(&self, count: usize) -> EngineResult<Vec<Snapshot>> {
        let project = self.project_id()?.clone();
        let branch = self.current_branch()?;
        let total = branch.snapshots.len();
        let skip = if count == 0 || count > total {
            0
        } else {
            total - count
        };

        branch.snapshots[skip..]
            .iter()
            .map(|id| self.repo.require_snapshot(&project, id).map_err(Into::into))
            .collect()
    }

    /// Snapshot count of a branch (the current one if `None`).
    pub fn get_history_count(&self, branch_name: Option<&str>) -> EngineResult<usize> {
        let project = self.project_id()?.clone();
        let branch = match branch_name {
            Some(name) => self
                .repo
                .branch(&project, name)?
                .ok_or_else(|| EngineError::BranchNotFound(name.to_string()))?,
            None => self.current_branch()?,
        };
        Ok(branch.snapshots.len())
    }

    /// The content the last snapshot recorded for `key`, if any.
    pub fn blob_from_last_snapshot(&self, key: &str) -> EngineResult<Option<Document>> {
        let project = self.project_id()?.clone();
        let branch = self.current_branch()?;
        let Some(snapshot) = self.repo.latest_snapshot(&project, &branch)? else {
            return Ok(None);
        };
        let Some(entry) = snapshot.state_entry(key) else {
            return Ok(None);
        };
        self.repo
            .blob_document(&project, &entry.blob)
            .map_err(Into::into)
    }

    /// Every document in the latest snapshot of the current branch.
    pub fn all_documents(&self) -> EngineResult<Vec<Document>> {
        let project = self.project_id()?.clone();
        let branch = self.current_branch()?;
        let snapshot = self
            .repo
            .latest_snapshot(&project, &branch)?
            .ok_or(EngineError::NoSnapshots)?;
        let ids: Vec<BlobId> = snapshot.state.iter().map(|entry| entry.blob).collect();
        Ok(self.repo.documents(&project, &ids)?)
    }

    /// Compute the changes needed to bring the live candidates back to a
    /// given snapshot. History is untouched; the caller applies the
    /// changeset and may then stage and commit it.
    ///
    /// Removals are returned as the candidates' own documents, because a
    /// record created after the snapshot may never have been stored as a
    /// blob.
    pub fn rollback(
        &self,
        snapshot_id: &SnapshotId,
        candidates: &[StatusCandidate],
    ) -> EngineResult<StateChangeset> {
        let project = self.project_id()?.clone();
        let snapshot = self.repo.require_snapshot(&project, snapshot_id)?;

        let live_state: SnapshotState = candidates
            .iter()
            .map(|candidate| {
                StateEntry::new(
                    candidate.key.clone(),
                    candidate.name.clone(),
                    hash_document(&candidate.document).id,
                )
            })
            .collect();

        let delta = state_delta(&live_state, &snapshot.state);
        let upsert_ids: Vec<BlobId> = delta.upserts().iter().map(|entry| entry.blob).collect();

        let mut remove = Vec::with_capacity(delta.remove.len());
        for entry in &delta.remove {
            let candidate = candidates
                .iter()
                .find(|candidate| candidate.key == entry.key)
                .ok_or_else(|| {
                    EngineError::Validation(format!(
                        "failed to find removal candidate for {}",
                        entry.key
                    ))
                })?;
            remove.push(candidate.document.clone());
        }

        info!(snapshot = %snapshot.id.short_hex(), "rolled back");
        Ok(StateChangeset {
            upsert: self.repo.documents(&project, &upsert_ids)?,
            remove,
        })
    }

    /// Roll back to the latest snapshot of the current branch.
    pub fn rollback_to_latest(
        &self,
        candidates: &[StatusCandidate],
    ) -> EngineResult<StateChangeset> {
        let project = self.project_id()?.clone();
        let branch = self.current_branch()?;
        let latest = self
            .repo
            .latest_snapshot(&project, &branch)?
            .ok_or(EngineError::NoSnapshots)?;
        self.rollback(&latest.id, candidates)
    }

    // ---------------------------------------------------------------
    // Branches
    // ---------------------------------------------------------------

    /// Name of the checked-out branch.
    pub fn get_branch(&self) -> EngineResult<String> {
        let project = self.project_id()?;
        Ok(self.repo.head(project)?.branch)
    }

    /// Names of all local branches, sorted.
    pub fn get_branches(&self) -> EngineResult<Vec<String>> {
        let project = self.project_id()?;
        let mut names: Vec<String> = self
            .repo
            .branches(project)?
            .into_iter()
            .map(|branch| branch.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Names of all branches on the remote.
    pub async fn get_remote_branches(&self) -> EngineResult<Vec<String>> {
        let remote = self.require_remote()?;
        let project = self.project_id()?.clone();
        let mut names: Vec<String> = remote
            .branches(&project)
            .await?
            .into_iter()
            .map(|branch| branch.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Move the head to `branch_name`, creating the branch empty if absent.
    ///
    /// Refuses if any candidate is in a conflicted state (unsaved changes
    /// that the switch would overwrite). Returns the blob contents to apply
    /// so the document store matches the target branch, excluding dirty
    /// candidates, which are left untouched.
    pub fn checkout(
        &mut self,
        candidates: &[StatusCandidate],
        branch_name: &str,
    ) -> EngineResult<StateChangeset> {
        let project = self.project_id()?.clone();
        let current = self.current_branch()?;
        let current_state = self.tip_state(&project, &current)?;
        let next = self.repo.get_or_create_branch(&project, branch_name)?;
        let next_state = self.tip_state(&project, &next)?;

        let check = pre_merge_check(&current_state, &next_state, candidates);
        if !check.is_clean() {
            return Err(EngineError::DirtyCandidates(
                "Please commit current changes before switching branches".into(),
            ));
        }

        self.repo.store_head(
            &project,
            &Head {
                branch: next.name.clone(),
            },
        )?;
        info!(branch = %next.name, "switched branch");

        let dirty: HashSet<&str> = check.dirty.iter().map(|c| c.key.as_str()).collect();
        self.changeset_between(&project, &current_state, &next_state, &dirty)
    }

    /// Create a new branch diverging from the current one.
    pub fn fork(&self, new_branch_name: &str) -> EngineResult<()> {
        let project = self.project_id()?.clone();
        validate_branch_name(new_branch_name)
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        if self.repo.branch(&project, new_branch_name)?.is_some() {
            return Err(EngineError::BranchExists(new_branch_name.to_string()));
        }

        let current = self.current_branch()?;
        let mut branch = Branch::new(new_branch_name);
        branch.snapshots = current.snapshots.clone();
        self.repo.store_branch(&project, &mut branch)?;
        info!(from = %current.name, to = new_branch_name, "forked branch");
        Ok(())
    }

    /// Delete a local branch. The default branch and the checked-out branch
    /// are protected.
    pub fn remove_branch(&self, name: &str) -> EngineResult<()> {
        let project = self.project_id()?.clone();
        let branch = self
            .repo
            .branch(&project, name)?
            .ok_or_else(|| EngineError::BranchNotFound(name.to_string()))?;

        if branch.name.eq_ignore_ascii_case(DEFAULT_BRANCH) {
            return Err(EngineError::CannotDeleteDefaultBranch);
        }
        let current = self.repo.head(&project)?.branch;
        if branch.name.eq_ignore_ascii_case(&current) {
            return Err(EngineError::CannotDeleteCurrentBranch);
        }

        self.repo.remove_branch(&project, name)?;
        info!(branch = name, "deleted local branch");
        Ok(())
    }

    /// Delete a branch on the remote. The default branch is protected.
    pub async fn remove_remote_branch(&self, name: &str) -> EngineResult<()> {
        if name.eq_ignore_ascii_case(DEFAULT_BRANCH) {
            return Err(EngineError::CannotDeleteDefaultBranch);
        }
        let remote = self.require_remote()?;
        let project = self.project_id()?.clone();
        remote.remove_branch(&project, name).await?;
        info!(branch = name, "deleted remote branch");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Merge
    // ---------------------------------------------------------------

    /// Merge another branch into the current one.
    ///
    /// No-ops when the other branch is empty or already merged;
    /// fast-forwards when the current branch has not diverged; otherwise
    /// performs a three-way merge from the shared root, routing conflicts
    /// through the registered resolver. Returns the changes the caller must
    /// apply, excluding dirty candidates.
    pub async fn merge(
        &mut self,
        candidates: &[StatusCandidate],
        other_branch_name: &str,
        message: Option<&str>,
    ) -> EngineResult<StateChangeset> {
        let trunk_name = self.get_branch()?;
        self.merge_branches(
            candidates,
            &trunk_name,
            other_branch_name,
            message,
            MergeLineage::Trunk,
        )
        .await
    }

    async fn merge_branches(
        &mut self,
        candidates: &[StatusCandidate],
        trunk_name: &str,
        other_name: &str,
        message: Option<&str>,
        lineage: MergeLineage,
    ) -> EngineResult<StateChangeset> {
        let project = self.project_id()?.clone();
        let other = self
            .repo
            .branch(&project, other_name)?
            .ok_or_else(|| EngineError::BranchNotFound(other_name.to_string()))?;
        let mut trunk = self
            .repo
            .branch(&project, trunk_name)?
            .ok_or_else(|| EngineError::BranchNotFound(trunk_name.to_string()))?;

        let latest_trunk = self.repo.latest_snapshot(&project, &trunk)?;
        let latest_other = self.repo.latest_snapshot(&project, &other)?;
        let trunk_state = latest_trunk
            .as_ref()
            .map(|snapshot| snapshot.state.clone())
            .unwrap_or_default();
        let other_state = latest_other
            .as_ref()
            .map(|snapshot| snapshot.state.clone())
            .unwrap_or_default();

        let check = pre_merge_check(&trunk_state, &other_state, candidates);
        if !check.is_clean() {
            return Err(EngineError::DirtyCandidates(
                "Please commit current changes or revert them before merging".into(),
            ));
        }

        let root_id = root_snapshot_id(&trunk, &other);
        let root_snapshot = match root_id {
            Some(id) => self.repo.snapshot(&project, &id)?,
            None => None,
        };

        let nothing_to_merge = other.is_empty()
            || latest_other
                .as_ref()
                .is_some_and(|snapshot| Some(snapshot.id) == root_id);
        let fast_forward = trunk.is_empty()
            || root_snapshot.as_ref().is_some_and(|root| {
                latest_trunk
                    .as_ref()
                    .map_or(true, |tip| tip.id == root.id)
            });

        if nothing_to_merge {
            debug!(other = %other.name, "nothing to merge");
        } else if fast_forward {
            info!(trunk = %trunk.name, other = %other.name, "fast-forward merge");
            trunk.snapshots = other.snapshots.clone();
            self.repo.store_branch(&project, &mut trunk)?;
        } else {
            info!(trunk = %trunk.name, other = %other.name, "three-way merge");
            let root_state = root_snapshot
                .as_ref()
                .map(|snapshot| snapshot.state.clone())
                .unwrap_or_default();
            let merged = three_way_merge(&root_state, &trunk_state, &other_state);
            let resolutions = self
                .resolve_conflicts(
                    merged.conflicts,
                    MergeLabels {
                        ours: trunk.name.clone(),
                        theirs: other.name.clone(),
                    },
                )
                .await?;
            let state = update_state_with_conflict_resolutions(&merged.state, &resolutions);

            if lineage == MergeLineage::Other {
                trunk.snapshots = other.snapshots.clone();
            }

            let default_message = format!("Merged branch {}", other.name);
            let name = message.unwrap_or(&default_message);
            self.commit_state(&project, &mut trunk, state, name)?;
        }

        let new_state = self.tip_state(&project, &trunk)?;
        let dirty: HashSet<&str> = check.dirty.iter().map(|c| c.key.as_str()).collect();
        self.changeset_between(&project, &trunk_state, &new_state, &dirty)
    }

    async fn resolve_conflicts(
        &self,
        conflicts: Vec<MergeConflict>,
        labels: MergeLabels,
    ) -> EngineResult<Vec<MergeConflict>> {
        if conflicts.is_empty() {
            return Ok(conflicts);
        }
        match &self.resolver {
            Some(resolver) => resolver.resolve(conflicts, labels).await,
            None => Err(EngineError::MergeConflicts(conflicts)),
        }
    }

    // ---------------------------------------------------------------
    // Remote reconciliation
    // ---------------------------------------------------------------

    /// Push the current branch to the remote.
    ///
    /// Fails unless the remote branch's history is a prefix of the local
    /// one (optimistic concurrency: the second writer must pull first).
    /// Uploads only blobs the remote reports missing, then the new
    /// snapshots, both batched to respect request-size limits.
    pub async fn push(&mut self) -> EngineResult<PushResult> {
        let remote = self.require_remote()?;
        let project = self.ensure_remote_project(&remote).await?;
        let branch = self.current_branch()?;

        let remote_ids = remote
            .branch(&project, &branch.name)
            .await?
            .map(|remote_branch| remote_branch.snapshots)
            .unwrap_or_default();

        for (index, remote_id) in remote_ids.iter().enumerate() {
            if branch.snapshots.get(index) != Some(remote_id) {
                return Err(EngineError::RemoteHistoryDiverged);
            }
        }

        let to_push = &branch.snapshots[remote_ids.len()..];
        if to_push.is_empty() {
            return Err(EngineError::AlreadyUpToDate);
        }

        let mut snapshots = Vec::with_capacity(to_push.len());
        let mut blob_ids = BTreeSet::new();
        for id in to_push {
            let mut snapshot = self.repo.require_snapshot(&project, id)?;
            // Snapshots taken before the author was known get stamped now.
            if snapshot.author.is_empty() {
                snapshot.author = self.author.clone();
            }
            blob_ids.extend(snapshot.state.iter().map(|entry| entry.blob));
            snapshots.push(snapshot);
        }

        let all_ids: Vec<BlobId> = blob_ids.into_iter().collect();
        let missing = remote.missing_blob_ids(&project, &all_ids).await?;

        let mut payloads = Vec::with_capacity(missing.len());
        for id in &missing {
            let bytes = self
                .repo
                .blob_bytes(&project, id)?
                .ok_or(RepoError::BlobNotFound(*id))?;
            payloads.push((*id, bytes));
        }
        let blobs_pushed = payloads.len();

        for batch in batch_blobs(payloads) {
            remote.push_blobs(&project, &batch).await?;
            debug!(count = batch.len(), "pushed blob batch");
        }

        for chunk in snapshots.chunks(SNAPSHOT_CHUNK) {
            let echoed = remote.push_snapshots(&project, &branch.name, chunk).await?;
            // The server-normalized snapshots are authoritative.
            self.repo.store_snapshots(&project, &echoed)?;
        }

        info!(
            branch = %branch.name,
            snapshots = snapshots.len(),
            blobs = blobs_pushed,
            "pushed"
        );
        Ok(PushResult {
            snapshots_pushed: snapshots.len(),
            blobs_pushed,
        })
    }

    /// Pull the remote's history for the current branch and merge it in.
    ///
    /// The remote branch is fetched into a temporary local branch (copying
    /// only snapshots and blobs absent locally), merged with the remote's
    /// lineage preferred, and the temporary branch discarded. Returns the
    /// changes the caller must apply.
    pub async fn pull(&mut self, candidates: &[StatusCandidate]) -> EngineResult<StateChangeset> {
        let remote = self.require_remote()?;
        self.ensure_remote_project(&remote).await?;
        let local_branch = self.current_branch()?;

        let tmp_name = format!("{}.hidden", local_branch.name);
        let tmp = self
            .fetch_remote_branch(&remote, &tmp_name, &local_branch.name)
            .await?;

        let message = format!("Synced latest changes from {}", local_branch.name);
        let changeset = self
            .merge_branches(
                candidates,
                &local_branch.name,
                &tmp.name,
                Some(&message),
                MergeLineage::Other,
            )
            .await?;

        let project = self.project_id()?.clone();
        self.repo.remove_branch(&project, &tmp.name)?;
        info!(branch = %local_branch.name, "pulled");
        Ok(changeset)
    }

    /// How the current branch compares to its remote counterpart.
    pub async fn compare_remote_branch(&self) -> EngineResult<BranchComparison> {
        let remote = self.require_remote()?;
        let project = self.project_id()?.clone();
        let local = self.current_branch()?;
        let remote_branch = remote.branch(&project, &local.name).await?;
        Ok(compare_branches(Some(&local), remote_branch.as_ref()))
    }

    /// Copy a remote branch into a local branch named `local_name`,
    /// fetching only what is missing locally.
    async fn fetch_remote_branch(
        &self,
        remote: &Arc<dyn RemoteHistory>,
        local_name: &str,
        remote_name: &str,
    ) -> EngineResult<Branch> {
        let project = self.project_id()?.clone();
        let remote_branch = remote
            .branch(&project, remote_name)
            .await?
            .ok_or_else(|| EngineError::BranchNotFound(remote_name.to_string()))?;

        let mut to_fetch = Vec::new();
        for id in &remote_branch.snapshots {
            if self.repo.snapshot(&project, id)?.is_none() {
                to_fetch.push(*id);
            }
        }

        let mut fetched = Vec::new();
        for chunk in to_fetch.chunks(SNAPSHOT_CHUNK) {
            fetched.extend(remote.snapshots(&project, chunk).await?);
        }

        let mut wanted = BTreeSet::new();
        for snapshot in &fetched {
            for entry in &snapshot.state {
                if !self.repo.has_blob(&project, &entry.blob)? {
                    wanted.insert(entry.blob);
                }
            }
        }
        let wanted: Vec<BlobId> = wanted.into_iter().collect();
        for chunk in wanted.chunks(BLOB_FETCH_CHUNK) {
            for (id, bytes) in remote.blobs(&project, chunk).await? {
                self.repo.store_blob_bytes(&project, &id, &bytes)?;
            }
        }

        self.repo.store_snapshots(&project, &fetched)?;

        let mut branch = remote_branch;
        branch.name = local_name.to_string();
        branch.created = Utc::now();
        self.repo.store_branch(&project, &mut branch)?;
        debug!(
            snapshots = fetched.len(),
            blobs = wanted.len(),
            "fetched remote branch"
        );
        Ok(branch)
    }

    async fn ensure_remote_project(
        &mut self,
        remote: &Arc<dyn RemoteHistory>,
    ) -> EngineResult<ProjectId> {
        let local = self.project.clone().ok_or(EngineError::NoActiveProject)?;
        let pointer = match remote.project(&local.id).await? {
            Some(pointer) => pointer,
            None => {
                let created = remote.create_project(&local).await?;
                info!(project = %created.id, "created remote project");
                created
            }
        };
        self.repo.store_project(&pointer)?;
        let id = pointer.id.clone();
        self.project = Some(pointer);
        Ok(id)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn project_id(&self) -> EngineResult<&ProjectId> {
        self.project
            .as_ref()
            .map(|pointer| &pointer.id)
            .ok_or(EngineError::NoActiveProject)
    }

    fn require_remote(&self) -> EngineResult<Arc<dyn RemoteHistory>> {
        self.remote.clone().ok_or(EngineError::RemoteNotConfigured)
    }

    fn current_branch(&self) -> EngineResult<Branch> {
        let project = self.project_id()?;
        let head = self.repo.head(project)?;
        Ok(self.repo.get_or_create_branch(project, &head.branch)?)
    }

    fn tip_state(&self, project: &ProjectId, branch: &Branch) -> EngineResult<SnapshotState> {
        Ok(self
            .repo
            .latest_snapshot(project, branch)?
            .map(|snapshot| snapshot.state)
            .unwrap_or_default())
    }

    /// Append a snapshot with `state` to `branch` and persist both.
    fn commit_state(
        &self,
        project: &ProjectId,
        branch: &mut Branch,
        state: SnapshotState,
        name: &str,
    ) -> EngineResult<Snapshot> {
        let parent = branch.tip().copied().unwrap_or(SnapshotId::null());
        let id = SnapshotId::compute(project, &parent, &state);

        let snapshot = Snapshot {
            id,
            parent,
            name: name.to_string(),
            description: String::new(),
            author: String::new(),
            created: Utc::now(),
            state,
            additional_fields: Default::default(),
        };

        branch.snapshots.push(snapshot.id);
        self.repo.store_branch(project, branch)?;
        self.repo.store_snapshot(project, &snapshot)?;
        info!(snapshot = %snapshot.id.short_hex(), branch = %branch.name, name, "created snapshot");
        Ok(snapshot)
    }

    /// Load the blob documents a caller must apply to move from one state
    /// to another, skipping dirty keys.
    fn changeset_between(
        &self,
        project: &ProjectId,
        from: &SnapshotState,
        to: &SnapshotState,
        dirty: &HashSet<&str>,
    ) -> EngineResult<StateChangeset> {
        let delta = state_delta(from, to);
        let upsert_ids: Vec<BlobId> = delta
            .upserts()
            .iter()
            .filter(|entry| !dirty.contains(entry.key.as_str()))
            .map(|entry| entry.blob)
            .collect();
        let remove_ids: Vec<BlobId> = delta
            .remove
            .iter()
            .filter(|entry| !dirty.contains(entry.key.as_str()))
            .map(|entry| entry.blob)
            .collect();

        Ok(StateChangeset {
            upsert: self.repo.documents(project, &upsert_ids)?,
            remove: self.repo.documents(project, &remove_ids)?,
        })
    }
}

impl std::fmt::Debug for Vcs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vcs")
            .field("project", &self.project)
            .field("staged_projects", &self.stages.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_remote::InMemoryRemote;
    use quiver_store::InMemoryByteStore;
    use serde_json::json;

    use crate::resolve::{AcceptOurs, AcceptTheirs};

    fn doc(value: &str) -> Document {
        json!({ "id": value })
    }

    fn cand(key: &str, value: &str) -> StatusCandidate {
        StatusCandidate::new(key, key.to_uppercase(), doc(value))
    }

    fn engine_with_store() -> (Arc<InMemoryByteStore>, Vcs) {
        let store = Arc::new(InMemoryByteStore::new());
        let mut vcs = Vcs::new(store.clone());
        vcs.switch_and_create_project_if_not_exist("wrk_1", "Test Workspace")
            .unwrap();
        (store, vcs)
    }

    fn engine() -> Vcs {
        engine_with_store().1
    }

    /// Stage everything unstaged and commit it.
    fn commit_all(vcs: &mut Vcs, candidates: &[StatusCandidate], message: &str) -> Snapshot {
        let status = vcs.status(candidates).unwrap();
        let entries: Vec<StageEntry> = status.unstaged.values().cloned().collect();
        vcs.stage(&entries).unwrap();
        vcs.take_snapshot(message).unwrap()
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    #[test]
    fn switch_and_create_is_idempotent() {
        let mut vcs = engine();
        let first = vcs.active_project().unwrap().id.clone();
        vcs.switch_and_create_project_if_not_exist("wrk_1", "Test Workspace")
            .unwrap();
        assert_eq!(vcs.active_project().unwrap().id, first);
        assert_eq!(vcs.local_projects().unwrap().len(), 1);
    }

    #[test]
    fn switch_project_deactivates_for_unknown_root() {
        let mut vcs = engine();
        assert!(vcs.has_project());
        vcs.switch_project("wrk_unknown").unwrap();
        assert!(!vcs.has_project());
        vcs.switch_project("wrk_1").unwrap();
        assert!(vcs.has_project());
    }

    #[test]
    fn operations_without_a_project_fail() {
        let mut vcs = Vcs::new(Arc::new(InMemoryByteStore::new()));
        assert!(matches!(
            vcs.status(&[]),
            Err(EngineError::NoActiveProject)
        ));
        assert!(matches!(
            vcs.take_snapshot("msg"),
            Err(EngineError::NoActiveProject)
        ));
    }

    #[test]
    fn remove_projects_for_root_clears_the_active_project() {
        let mut vcs = engine();
        vcs.remove_projects_for_root("wrk_1").unwrap();
        assert!(!vcs.has_project());
        assert!(vcs.local_projects().unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Status and staging
    // -----------------------------------------------------------------------

    #[test]
    fn status_with_no_commits_reports_additions() {
        let vcs = engine();
        let status = vcs
            .status(&[cand("foo", "bar"), cand("baz", "qux")])
            .unwrap();

        assert!(status.stage.is_empty());
        assert_eq!(status.unstaged.len(), 2);
        assert!(matches!(
            status.unstaged.get("foo"),
            Some(StageEntry::Added { .. })
        ));
        assert!(matches!(
            status.unstaged.get("baz"),
            Some(StageEntry::Added { .. })
        ));
    }

    #[test]
    fn status_key_is_stable_until_something_changes() {
        let mut vcs = engine();
        let candidates = [cand("foo", "bar")];
        let first = vcs.status(&candidates).unwrap();
        let second = vcs.status(&candidates).unwrap();
        assert_eq!(first.key, second.key);

        let entries: Vec<StageEntry> = first.unstaged.values().cloned().collect();
        vcs.stage(&entries).unwrap();
        let third = vcs.status(&candidates).unwrap();
        assert_ne!(first.key, third.key);
    }

    #[test]
    fn staging_everything_empties_unstaged() {
        let mut vcs = engine();
        let candidates = [cand("a", "1"), cand("b", "2")];
        let status = vcs.status(&candidates).unwrap();
        let entries: Vec<StageEntry> = status.unstaged.values().cloned().collect();

        let stage = vcs.stage(&entries).unwrap();
        assert_eq!(stage.len(), 2);

        let after = vcs.status(&candidates).unwrap();
        assert!(after.unstaged.is_empty());
        assert_eq!(after.stage.len(), 2);
    }

    #[test]
    fn unstage_brings_entries_back() {
        let mut vcs = engine();
        let candidates = [cand("a", "1")];
        let status = vcs.status(&candidates).unwrap();
        let entries: Vec<StageEntry> = status.unstaged.values().cloned().collect();
        vcs.stage(&entries).unwrap();
        vcs.unstage(&entries).unwrap();

        let after = vcs.status(&candidates).unwrap();
        assert!(after.stage.is_empty());
        assert_eq!(after.unstaged.len(), 1);
    }

    #[test]
    fn staged_entry_that_drifts_shows_up_again() {
        let mut vcs = engine();
        let status = vcs.status(&[cand("a", "v1")]).unwrap();
        let entries: Vec<StageEntry> = status.unstaged.values().cloned().collect();
        vcs.stage(&entries).unwrap();

        // Re-edited while staged: the new content is unstaged again.
        let drifted = vcs.status(&[cand("a", "v2")]).unwrap();
        assert_eq!(drifted.stage.len(), 1);
        assert_eq!(drifted.unstaged.len(), 1);
        assert!(matches!(
            drifted.unstaged.get("a"),
            Some(StageEntry::Added { .. })
        ));
    }

    #[test]
    fn modified_entries_carry_previous_content() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("a", "v1")], "Add a");

        let status = vcs.status(&[cand("a", "v2")]).unwrap();
        match status.unstaged.get("a") {
            Some(StageEntry::Modified {
                previous_blob_content,
                ..
            }) => assert_eq!(previous_blob_content.as_ref(), Some(&doc("v1"))),
            other => panic!("expected Modified, got {other:?}"),
        }

        let deleted = vcs.status(&[]).unwrap();
        match deleted.unstaged.get("a") {
            Some(StageEntry::Deleted {
                previous_blob_content,
                ..
            }) => assert_eq!(previous_blob_content.as_ref(), Some(&doc("v1"))),
            other => panic!("expected Deleted, got {other:?}"),
        }
    }

    #[test]
    fn identical_content_under_two_keys_stores_one_blob() {
        let (store, mut vcs) = engine_with_store();
        let candidates = [cand("first", "same"), cand("second", "same")];
        let status = vcs.status(&candidates).unwrap();
        let entries: Vec<StageEntry> = status.unstaged.values().cloned().collect();
        assert_eq!(entries[0].blob_id(), entries[1].blob_id());

        vcs.stage(&entries).unwrap();
        let project = vcs.active_project().unwrap().id.clone();
        let blobs = store
            .list(&format!("projects/{project}/blobs"))
            .unwrap();
        assert_eq!(blobs.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    #[test]
    fn take_snapshot_requires_a_message_and_a_stage() {
        let mut vcs = engine();
        assert!(matches!(
            vcs.take_snapshot("  "),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            vcs.take_snapshot("Empty stage"),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn take_snapshot_clears_stage_and_extends_history() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("foo", "bar")], "Add foo");

        let status = vcs.status(&[cand("foo", "bar")]).unwrap();
        assert!(status.is_clean());

        let history = vcs.get_history(0).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "Add foo");
        assert_eq!(history[0].state.len(), 1);
        assert_eq!(history[0].state[0].key, "foo");
        assert!(history[0].parent.is_null());
    }

    #[test]
    fn snapshot_ids_are_deterministic_across_engines() {
        let pointer = ProjectPointer::create("wrk_det", "Deterministic");

        let mut first = Vcs::new(Arc::new(InMemoryByteStore::new()));
        first.set_project(pointer.clone()).unwrap();
        let a = commit_all(&mut first, &[cand("foo", "bar")], "Add foo");

        let mut second = Vcs::new(Arc::new(InMemoryByteStore::new()));
        second.set_project(pointer).unwrap();
        let b = commit_all(&mut second, &[cand("foo", "bar")], "Add foo");

        assert_eq!(a.id, b.id);
    }

    #[test]
    fn end_to_end_add_then_delete() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("foo", "d1")], "Add foo");
        assert_eq!(vcs.get_history_count(None).unwrap(), 1);

        // Empty candidates mean foo was deleted from the document store.
        commit_all(&mut vcs, &[], "Delete foo");

        let history = vcs.get_history(0).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[1].state.is_empty());
        assert_eq!(history[1].parent, history[0].id);
    }

    #[test]
    fn get_history_respects_the_count() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("a", "1")], "one");
        commit_all(&mut vcs, &[cand("b", "2")], "two");
        commit_all(&mut vcs, &[cand("c", "3")], "three");

        assert_eq!(vcs.get_history(0).unwrap().len(), 3);
        let last_two = vcs.get_history(2).unwrap();
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].name, "two");
        assert_eq!(vcs.get_history(99).unwrap().len(), 3);
    }

    #[test]
    fn blob_from_last_snapshot_returns_committed_content() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("foo", "bar")], "Add foo");
        assert_eq!(
            vcs.blob_from_last_snapshot("foo").unwrap(),
            Some(doc("bar"))
        );
        assert_eq!(vcs.blob_from_last_snapshot("missing").unwrap(), None);
    }

    #[test]
    fn all_documents_returns_the_full_tree() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("a", "1"), cand("b", "2")], "Add both");
        let documents = vcs.all_documents().unwrap();
        assert_eq!(documents.len(), 2);
        assert!(documents.contains(&doc("1")));
        assert!(documents.contains(&doc("2")));
    }

    #[test]
    fn rollback_restores_the_snapshot_state() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("a", "v1")], "Add a");

        // Live document drifted to v2 and a new record appeared.
        let changeset = vcs
            .rollback_to_latest(&[cand("a", "v2"), cand("extra", "x")])
            .unwrap();

        assert_eq!(changeset.upsert, vec![doc("v1")]);
        assert_eq!(changeset.remove, vec![doc("x")]);
    }

    #[test]
    fn rollback_without_snapshots_fails() {
        let vcs = engine();
        assert!(matches!(
            vcs.rollback_to_latest(&[]),
            Err(EngineError::NoSnapshots)
        ));
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    #[test]
    fn default_branch_is_master() {
        let vcs = engine();
        assert_eq!(vcs.get_branch().unwrap(), "master");
        assert_eq!(vcs.get_branches().unwrap(), vec!["master".to_string()]);
    }

    #[test]
    fn fork_copies_history() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("a", "1")], "Add a");
        vcs.fork("dev").unwrap();

        assert_eq!(vcs.get_history_count(Some("dev")).unwrap(), 1);
        // Still on master.
        assert_eq!(vcs.get_branch().unwrap(), "master");
    }

    #[test]
    fn fork_rejects_bad_and_duplicate_names() {
        let vcs = engine();
        assert!(matches!(
            vcs.fork("ab"),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            vcs.fork("-bad"),
            Err(EngineError::Validation(_))
        ));

        vcs.fork("dev").unwrap();
        assert!(matches!(
            vcs.fork("dev"),
            Err(EngineError::BranchExists(_))
        ));
    }

    #[test]
    fn remove_branch_guards() {
        let mut vcs = engine();
        vcs.fork("dev").unwrap();

        assert!(matches!(
            vcs.remove_branch("master"),
            Err(EngineError::CannotDeleteDefaultBranch)
        ));
        assert!(matches!(
            vcs.remove_branch("ghost"),
            Err(EngineError::BranchNotFound(_))
        ));

        vcs.checkout(&[], "dev").unwrap();
        assert!(matches!(
            vcs.remove_branch("dev"),
            Err(EngineError::CannotDeleteCurrentBranch)
        ));

        vcs.checkout(&[], "master").unwrap();
        vcs.remove_branch("dev").unwrap();
        assert_eq!(vcs.get_branches().unwrap(), vec!["master".to_string()]);
    }

    #[test]
    fn checkout_moves_head_and_returns_the_delta() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("foo", "bar")], "Add foo");

        // New branch starts empty, so foo must be removed from the caller's
        // document store.
        let to_empty = vcs.checkout(&[], "fresh").unwrap();
        assert_eq!(vcs.get_branch().unwrap(), "fresh");
        assert!(to_empty.upsert.is_empty());
        assert_eq!(to_empty.remove, vec![doc("bar")]);

        // And back again.
        let back = vcs.checkout(&[], "master").unwrap();
        assert_eq!(back.upsert, vec![doc("bar")]);
        assert!(back.remove.is_empty());
    }

    #[test]
    fn checkout_refuses_conflicted_candidates() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("a", "v1")], "Add a");
        vcs.checkout(&[cand("a", "v1")], "dev").unwrap();
        commit_all(&mut vcs, &[cand("a", "v2")], "Change a");
        vcs.checkout(&[cand("a", "v2")], "master").unwrap();

        // Live value differs from both endpoints, which themselves differ.
        let result = vcs.checkout(&[cand("a", "v3")], "dev");
        assert!(matches!(result, Err(EngineError::DirtyCandidates(_))));
        // Head did not move.
        assert_eq!(vcs.get_branch().unwrap(), "master");
    }

    #[test]
    fn checkout_leaves_dirty_candidates_alone() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("a", "v1"), cand("b", "v1")], "Add both");
        vcs.fork("dev").unwrap();

        // "b" has an unsaved edit, but both endpoints agree on it, so the
        // switch proceeds and leaves "b" out of the changeset.
        let changeset = vcs
            .checkout(&[cand("a", "v1"), cand("b", "edited")], "dev")
            .unwrap();
        assert!(changeset.is_empty());
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn merge_of_already_merged_branch_is_a_no_op() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("a", "1")], "Add a");
        vcs.fork("dev").unwrap();

        let changeset = vcs.merge(&[], "dev", None).await.unwrap();
        assert!(changeset.is_empty());
        assert_eq!(vcs.get_history_count(None).unwrap(), 1);
    }

    #[tokio::test]
    async fn merge_fast_forwards_without_a_new_snapshot() {
        let mut vcs = engine();
        commit_all(&mut vcs, &[cand("a", "1")], "Add a");
        vcs.fork("dev").unwrap();
        vcs.checkout(&[], "dev").unwrap();
        commit_all(&mut vcs, &[cand("a", "1"), cand("b", "2")], "Add b");
        vcs.checkout(&[], "master").unwrap();

        let changeset = vcs.merge(&[], "dev", None).await.unwrap();

        // Pointer move only: histories are now identical and no merge
        // snapshot was created.
        assert_eq!(vcs.get_history_count(None).unwrap(), 2);
        let master: Vec<SnapshotId> =
            vcs.get_history(0).unwrap().into_iter().map(|s| s.id).collect();
        vcs.checkout(&[], "dev").unwrap();
        let dev: Vec<SnapshotId> =
            vcs.get_history(0).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(master, dev);
        assert_eq!(changeset.upsert, vec![doc("2")]);
    }

    /// Builds the divergence from §"both modified": root a:1, trunk a:2,
    /// other branch a:3.
    fn diverged_engine(resolver: Option<Arc<dyn ConflictResolver>>) -> Vcs {
        let mut vcs = Vcs::new(Arc::new(InMemoryByteStore::new()));
        if let Some(resolver) = resolver {
            vcs = vcs.with_resolver(resolver);
        }
        vcs.switch_and_create_project_if_not_exist("wrk_1", "Test Workspace")
            .unwrap();
        commit_all(&mut vcs, &[cand("a", "1")], "Add a");
        vcs.fork("dev").unwrap();
        commit_all(&mut vcs, &[cand("a", "2")], "Trunk change");
        vcs.checkout(&[], "dev").unwrap();
        commit_all(&mut vcs, &[cand("a", "3")], "Other change");
        vcs.checkout(&[], "master").unwrap();
        vcs
    }

    #[tokio::test]
    async fn conflicting_merge_without_resolver_fails() {
        let mut vcs = diverged_engine(None);
        let result = vcs.merge(&[], "dev", None).await;
        match result {
            Err(EngineError::MergeConflicts(conflicts)) => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].key, "a");
                assert_eq!(conflicts[0].message, "both modified");
            }
            other => panic!("expected MergeConflicts, got {other:?}"),
        }
        // Nothing was committed.
        assert_eq!(vcs.get_history_count(None).unwrap(), 2);
    }

    #[tokio::test]
    async fn resolver_choosing_theirs_wins_the_merge() {
        let mut vcs = diverged_engine(Some(Arc::new(AcceptTheirs)));
        let changeset = vcs.merge(&[], "dev", Some("Merge dev")).await.unwrap();

        assert_eq!(vcs.blob_from_last_snapshot("a").unwrap(), Some(doc("3")));
        assert_eq!(changeset.upsert, vec![doc("3")]);
        // One merge snapshot on top of the two trunk commits.
        let history = vcs.get_history(0).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].name, "Merge dev");
    }

    #[tokio::test]
    async fn resolver_choosing_ours_keeps_the_trunk_value() {
        let mut vcs = diverged_engine(Some(Arc::new(AcceptOurs)));
        let changeset = vcs.merge(&[], "dev", None).await.unwrap();

        assert_eq!(vcs.blob_from_last_snapshot("a").unwrap(), Some(doc("2")));
        // The trunk already had the winning value, so nothing to apply.
        assert!(changeset.is_empty());
    }

    #[tokio::test]
    async fn merge_with_dirty_divergent_candidate_fails() {
        let mut vcs = diverged_engine(Some(Arc::new(AcceptTheirs)));
        let result = vcs.merge(&[cand("a", "live")], "dev", None).await;
        assert!(matches!(result, Err(EngineError::DirtyCandidates(_))));
    }

    // -----------------------------------------------------------------------
    // Push / pull
    // -----------------------------------------------------------------------

    fn remote_engine(remote: Arc<InMemoryRemote>) -> Vcs {
        Vcs::new(Arc::new(InMemoryByteStore::new()))
            .with_remote(remote)
            .with_author("acct_tester")
    }

    #[tokio::test]
    async fn push_uploads_history_and_blobs() {
        let remote = Arc::new(InMemoryRemote::new());
        let mut vcs = remote_engine(remote.clone());
        vcs.switch_and_create_project_if_not_exist("wrk_1", "Test Workspace")
            .unwrap();
        commit_all(&mut vcs, &[cand("foo", "bar")], "Add foo");

        let result = vcs.push().await.unwrap();
        assert_eq!(result.snapshots_pushed, 1);
        assert_eq!(result.blobs_pushed, 1);

        let project = vcs.active_project().unwrap().id.clone();
        let branch = remote.branch(&project, "master").await.unwrap().unwrap();
        assert_eq!(branch.snapshots.len(), 1);
        assert_eq!(remote.blob_count(&project), 1);

        // Pushing again with nothing new is reported as such.
        assert!(matches!(
            vcs.push().await,
            Err(EngineError::AlreadyUpToDate)
        ));
    }

    #[tokio::test]
    async fn push_skips_blobs_the_remote_already_has() {
        let remote = Arc::new(InMemoryRemote::new());
        let mut vcs = remote_engine(remote.clone());
        vcs.switch_and_create_project_if_not_exist("wrk_1", "Test Workspace")
            .unwrap();
        commit_all(&mut vcs, &[cand("foo", "bar")], "Add foo");
        vcs.push().await.unwrap();

        // Second commit reuses foo's blob and adds one new blob.
        commit_all(&mut vcs, &[cand("foo", "bar"), cand("new", "x")], "Add new");
        let result = vcs.push().await.unwrap();
        assert_eq!(result.snapshots_pushed, 1);
        assert_eq!(result.blobs_pushed, 1);
    }

    #[tokio::test]
    async fn pull_reproduces_remote_history_exactly() {
        let remote = Arc::new(InMemoryRemote::new());
        let mut alice = remote_engine(remote.clone());
        alice
            .switch_and_create_project_if_not_exist("wrk_1", "Shared")
            .unwrap();
        commit_all(&mut alice, &[cand("foo", "bar")], "Add foo");
        alice.push().await.unwrap();

        let mut bob = remote_engine(remote.clone());
        bob.set_project(alice.active_project().unwrap().clone())
            .unwrap();

        let changeset = bob.pull(&[]).await.unwrap();
        assert_eq!(changeset.upsert, vec![doc("bar")]);
        assert!(changeset.remove.is_empty());

        let alice_ids: Vec<SnapshotId> =
            alice.get_history(0).unwrap().into_iter().map(|s| s.id).collect();
        let bob_ids: Vec<SnapshotId> =
            bob.get_history(0).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(alice_ids, bob_ids);

        // The temporary fetch branch is gone.
        assert_eq!(bob.get_branches().unwrap(), vec!["master".to_string()]);
    }

    #[tokio::test]
    async fn push_after_someone_else_pushed_requires_a_pull() {
        let remote = Arc::new(InMemoryRemote::new());
        let mut alice = remote_engine(remote.clone());
        alice
            .switch_and_create_project_if_not_exist("wrk_1", "Shared")
            .unwrap();
        commit_all(&mut alice, &[cand("foo", "1")], "Add foo");
        alice.push().await.unwrap();

        let mut bob = remote_engine(remote.clone());
        bob.set_project(alice.active_project().unwrap().clone())
            .unwrap();
        bob.pull(&[]).await.unwrap();
        commit_all(&mut bob, &[cand("foo", "1"), cand("bar", "2")], "Add bar");
        bob.push().await.unwrap();

        // Alice diverges locally, so her push must be rejected.
        commit_all(&mut alice, &[cand("foo", "1"), cand("baz", "3")], "Add baz");
        assert!(matches!(
            alice.push().await,
            Err(EngineError::RemoteHistoryDiverged)
        ));

        // A pull reconciles (no conflicting keys), after which push works.
        let changeset = alice.pull(&[]).await.unwrap();
        assert_eq!(changeset.upsert, vec![doc("2")]);
        alice.push().await.unwrap();

        // Remote history: Alice's first commit, Bob's commit, the merge.
        let project = alice.active_project().unwrap().id.clone();
        let branch = remote.branch(&project, "master").await.unwrap().unwrap();
        assert_eq!(branch.snapshots.len(), 3);
    }

    #[tokio::test]
    async fn pull_resolves_conflicts_preferring_the_remote_lineage() {
        let remote = Arc::new(InMemoryRemote::new());
        let mut alice = remote_engine(remote.clone());
        alice
            .switch_and_create_project_if_not_exist("wrk_1", "Shared")
            .unwrap();
        commit_all(&mut alice, &[cand("a", "1")], "Add a");
        alice.push().await.unwrap();

        let mut bob = Vcs::new(Arc::new(InMemoryByteStore::new()))
            .with_remote(remote.clone())
            .with_resolver(Arc::new(AcceptTheirs));
        bob.set_project(alice.active_project().unwrap().clone())
            .unwrap();
        bob.pull(&[]).await.unwrap();

        // Both sides change "a" incompatibly; Alice wins the race to push.
        commit_all(&mut bob, &[cand("a", "3")], "Bob change");
        commit_all(&mut alice, &[cand("a", "2")], "Alice change");
        alice.push().await.unwrap();

        let changeset = bob.pull(&[]).await.unwrap();
        // "Theirs" is the remote: Alice's value wins.
        assert_eq!(bob.blob_from_last_snapshot("a").unwrap(), Some(doc("2")));
        assert_eq!(changeset.upsert, vec![doc("2")]);

        // Bob's history is now the remote lineage plus one merge snapshot,
        // which makes the follow-up push a prefix extension.
        bob.push().await.unwrap();
    }

    #[tokio::test]
    async fn remote_operations_without_a_client_fail() {
        let mut vcs = engine();
        assert!(matches!(
            vcs.push().await,
            Err(EngineError::RemoteNotConfigured)
        ));
        assert!(matches!(
            vcs.pull(&[]).await,
            Err(EngineError::RemoteNotConfigured)
        ));
    }

    #[tokio::test]
    async fn compare_remote_branch_counts_divergence() {
        let remote = Arc::new(InMemoryRemote::new());
        let mut vcs = remote_engine(remote.clone());
        vcs.switch_and_create_project_if_not_exist("wrk_1", "Test Workspace")
            .unwrap();
        commit_all(&mut vcs, &[cand("a", "1")], "Add a");
        vcs.push().await.unwrap();

        assert_eq!(
            vcs.compare_remote_branch().await.unwrap(),
            BranchComparison { ahead: 0, behind: 0 }
        );

        commit_all(&mut vcs, &[cand("b", "2")], "Add b");
        assert_eq!(
            vcs.compare_remote_branch().await.unwrap(),
            BranchComparison { ahead: 1, behind: 0 }
        );
    }

    #[tokio::test]
    async fn remove_remote_branch_protects_the_default() {
        let remote = Arc::new(InMemoryRemote::new());
        let mut vcs = remote_engine(remote.clone());
        vcs.switch_and_create_project_if_not_exist("wrk_1", "Test Workspace")
            .unwrap();
        assert!(matches!(
            vcs.remove_remote_branch("master").await,
            Err(EngineError::CannotDeleteDefaultBranch)
        ));
    }

    #[tokio::test]
    async fn archive_project_clears_local_state() {
        let remote = Arc::new(InMemoryRemote::new());
        let mut vcs = remote_engine(remote.clone());
        vcs.switch_and_create_project_if_not_exist("wrk_1", "Test Workspace")
            .unwrap();
        commit_all(&mut vcs, &[cand("a", "1")], "Add a");
        vcs.push().await.unwrap();

        let project = vcs.active_project().unwrap().id.clone();
        vcs.archive_project().await.unwrap();

        assert!(!vcs.has_project());
        assert!(remote.is_archived(&project));
        assert!(vcs.local_projects().unwrap().is_empty());
    }
}
