//! Reconciliation engine
//!
//! The [`SyncEngine`] brings a local folder tree and the remote tree into
//! agreement in one linear pass.
//!
//! ## Sync Flow
//!
//! 1. **Local deletions** (Phase 0): items present in the previous run's
//!    snapshot but gone now are deleted on the remote, deepest first
//! 2. **Folder reconciliation** (Phase 1): starting at the remote root, each
//!    folder's remote children are compared with the local ones by
//!    modification time; newer wins, missing items are created on the side
//!    that lacks them unless every deletion gate says the item was deleted
//!    remotely, in which case the local copy is trashed
//! 3. **Commit**: fresh remote cursor, run state, local snapshot
//!
//! A failure in steps 1-3 that affects a single item is recorded in
//! [`SyncResult::errors`] and the run goes on. A failure to read either tree
//! or to persist state aborts the run before anything is committed.

use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use drupebox_core::domain::entry::{DeleteOutcome, EntryKind, RemoteEntry};
use drupebox_core::domain::paths::RemotePath;
use drupebox_core::domain::policy::SyncPolicy;
use drupebox_core::ports::local_filesystem::{FileSystemState, ILocalFileSystem};
use drupebox_core::ports::remote_storage::IRemoteStorage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::local_tree::{locally_deleted_since, LocalTreeStore};
use crate::remote_cache::RemoteTreeCache;
use crate::run_state::{RunState, RunStateStore};

// ============================================================================
// SyncAction / SyncResult
// ============================================================================

/// One change made during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "path", rename_all = "snake_case")]
pub enum SyncAction {
    /// Remote file written to the local tree
    Download(RemotePath),
    /// Local file written to the remote
    Upload(RemotePath),
    CreateLocalFolder(RemotePath),
    CreateRemoteFolder(RemotePath),
    /// Local item moved to the trash because it was deleted remotely
    TrashLocal(PathBuf),
    /// Remote item deleted because it was deleted locally
    DeleteRemote(RemotePath),
}

/// Summary of a completed run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    /// Every change made, in the order it was made
    pub actions: Vec<SyncAction>,
    /// Number of files downloaded from the remote
    pub files_downloaded: u32,
    /// Number of files uploaded to the remote
    pub files_uploaded: u32,
    /// Number of folders created on either side
    pub folders_created: u32,
    /// Number of items deleted (trashed locally or deleted remotely)
    pub files_deleted: u32,
    /// Files left alone for being at or above the size ceiling
    pub skipped_too_large: Vec<RemotePath>,
    /// Whether Phase 0 was skipped because the exclusion list changed
    pub local_deletions_skipped: bool,
    /// Errors encountered during the run (non-fatal)
    pub errors: Vec<String>,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}

impl SyncResult {
    /// Record a successful action and bump its counter
    pub fn record(&mut self, action: SyncAction) {
        match &action {
            SyncAction::Download(_) => self.files_downloaded += 1,
            SyncAction::Upload(_) => self.files_uploaded += 1,
            SyncAction::CreateLocalFolder(_) | SyncAction::CreateRemoteFolder(_) => {
                self.folders_created += 1;
            }
            SyncAction::TrashLocal(_) | SyncAction::DeleteRemote(_) => self.files_deleted += 1,
        }
        self.actions.push(action);
    }

    /// Record a failure affecting a single item
    pub fn record_error(&mut self, operation: &str, path: &dyn Display, err: &anyhow::Error) {
        warn!(operation, path = %path, error = %format!("{err:#}"), "Item failed, continuing");
        self.errors.push(format!("{operation} {path}: {err:#}"));
    }

    /// Whether the run changed nothing on either side
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

// ============================================================================
// RunContext
// ============================================================================

/// State that lives for exactly one call to [`SyncEngine::sync`]
struct RunContext {
    /// What the previous run left behind
    previous: RunState,
    /// Remote listing and remote deletions for this run
    remote: RemoteTreeCache,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Bidirectional reconciliation engine
///
/// ## Dependencies
///
/// - `remote`: Remote storage operations (list, transfer, delete, cursors)
/// - `local_filesystem`: Local file I/O, modification times, trash
/// - `policy`: Root, exclusions, ignore rules and deletion gates
/// - `state_dir`: Where the run state and the local snapshot are kept
pub struct SyncEngine {
    remote: Arc<dyn IRemoteStorage + Send + Sync>,
    local_filesystem: Arc<dyn ILocalFileSystem + Send + Sync>,
    policy: SyncPolicy,
    run_state_store: RunStateStore,
    tree_store: LocalTreeStore,
}

impl SyncEngine {
    /// Creates a new `SyncEngine` with the given dependencies
    pub fn new(
        remote: Arc<dyn IRemoteStorage + Send + Sync>,
        local_filesystem: Arc<dyn ILocalFileSystem + Send + Sync>,
        policy: SyncPolicy,
        state_dir: &Path,
    ) -> Self {
        Self {
            remote,
            local_filesystem,
            policy,
            run_state_store: RunStateStore::new(state_dir),
            tree_store: LocalTreeStore::new(state_dir),
        }
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    pub fn run_state_store(&self) -> &RunStateStore {
        &self.run_state_store
    }

    pub fn tree_store(&self) -> &LocalTreeStore {
        &self.tree_store
    }

    // ========================================================================
    // SyncEngine::sync()
    // ========================================================================

    /// Performs one full reconciliation run
    ///
    /// # Errors
    /// Returns an error if either tree cannot be read or state cannot be
    /// persisted. Nothing is committed in that case.
    #[tracing::instrument(skip(self), fields(root = %self.policy.root))]
    pub async fn sync(&self) -> Result<SyncResult> {
        let start = std::time::Instant::now();
        let mut result = SyncResult::default();

        info!("Starting sync run");

        let previous = self
            .run_state_store
            .load()
            .await
            .context("Failed to load run state")?;
        let mut ctx = RunContext {
            previous,
            remote: RemoteTreeCache::new(self.remote.clone(), self.policy.remote_staleness),
        };

        self.propagate_local_deletions(&ctx, &mut result).await?;

        info!("Syncing all other local and remote changes");
        self.reconcile_folder(&mut ctx, &RemotePath::root(), &mut result)
            .await?;

        self.commit().await?;

        result.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            downloaded = result.files_downloaded,
            uploaded = result.files_uploaded,
            folders_created = result.folders_created,
            deleted = result.files_deleted,
            skipped_too_large = result.skipped_too_large.len(),
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "Sync run complete"
        );

        Ok(result)
    }

    // ========================================================================
    // Phase 0: local deletions
    // ========================================================================

    /// Deletes on the remote whatever disappeared locally since last run
    #[tracing::instrument(skip_all)]
    async fn propagate_local_deletions(
        &self,
        ctx: &RunContext,
        result: &mut SyncResult,
    ) -> Result<()> {
        info!("Syncing locally deleted items since last run");

        if ctx.previous.exclusion_set_changed(&self.policy.exclusions) {
            info!("Exclusion list changed since last run, skipping local deletion check");
            result.local_deletions_skipped = true;
            return Ok(());
        }

        let previous = self
            .tree_store
            .previous_tree()
            .await
            .context("Failed to load previous local snapshot")?;
        let current = self
            .tree_store
            .current_tree(self.policy.root.path(), &self.policy.exclusions)
            .await
            .context("Failed to walk local tree")?;

        for local in locally_deleted_since(&previous, &current) {
            let remote = match self.policy.root.to_remote(&local) {
                Ok(remote) => remote,
                Err(err) => {
                    warn!(path = %local.display(), error = %err, "Snapshot entry outside sync root, ignoring");
                    continue;
                }
            };

            info!(path = %remote, "Found locally deleted item, deleting on remote");
            match self.remote.delete(&remote).await {
                Ok(DeleteOutcome::Deleted) => result.record(SyncAction::DeleteRemote(remote)),
                Ok(DeleteOutcome::NotFound) => {
                    info!(path = %remote, "Tried to delete on remote, but it was not there");
                }
                Err(err) => result.record_error("delete remote", &remote, &err),
            }
        }

        Ok(())
    }

    // ========================================================================
    // Phase 1: folder reconciliation
    // ========================================================================

    /// Reconciles one folder, then recurses into its local subfolders
    fn reconcile_folder<'a>(
        &'a self,
        ctx: &'a mut RunContext,
        remote_folder: &'a RemotePath,
        result: &'a mut SyncResult,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            info!(folder = %remote_folder, "Reconciling folder");
            let local_folder = self.policy.root.to_local(remote_folder);

            let remote_children = ctx
                .remote
                .list_folder(remote_folder)
                .await
                .with_context(|| format!("Failed to list remote folder {remote_folder}"))?;

            // Remote items against their local counterparts
            for entry in &remote_children {
                let local = self.policy.root.to_local(&entry.path);
                if self.policy.should_skip(&local) {
                    continue;
                }
                self.reconcile_remote_entry(entry, &local, result).await;
            }

            // Local items without a remote counterpart
            for local in self.list_local(&local_folder).await? {
                if self.policy.should_skip(&local) {
                    continue;
                }
                let remote = match self.policy.root.to_remote(&local) {
                    Ok(remote) => remote,
                    Err(err) => {
                        result.record_error("map local path", &local.display(), &anyhow::Error::from(err));
                        continue;
                    }
                };
                if remote_children.iter().any(|entry| entry.path == remote) {
                    continue;
                }
                self.reconcile_local_only(ctx, &local, &remote, result)
                    .await?;
            }

            // Listed again: the passes above may have created folders
            for local in self.list_local(&local_folder).await? {
                let state = match self.local_filesystem.get_state(&local).await {
                    Ok(state) => state,
                    Err(err) => {
                        result.record_error("stat", &local.display(), &err);
                        continue;
                    }
                };
                if !state.is_directory() || self.policy.should_skip(&local) {
                    continue;
                }
                let sub_folder = match self.policy.root.to_remote(&local) {
                    Ok(remote) => remote,
                    Err(err) => {
                        result.record_error("map local path", &local.display(), &anyhow::Error::from(err));
                        continue;
                    }
                };
                self.reconcile_folder(ctx, &sub_folder, result).await?;
            }

            Ok(())
        })
    }

    async fn list_local(&self, folder: &Path) -> Result<Vec<PathBuf>> {
        self.local_filesystem
            .list_dir(folder)
            .await
            .with_context(|| format!("Failed to list local folder {}", folder.display()))
    }

    /// Applies the newer-wins rule to one remote child
    async fn reconcile_remote_entry(
        &self,
        entry: &RemoteEntry,
        local: &Path,
        result: &mut SyncResult,
    ) {
        let state = match self.local_filesystem.get_state(local).await {
            Ok(state) => state,
            Err(err) => {
                result.record_error("stat", &local.display(), &err);
                return;
            }
        };

        match &entry.kind {
            EntryKind::Folder => {
                if !state.exists {
                    info!(path = %entry.path, "Found new folder on remote, creating locally");
                    match self.local_filesystem.create_directory(local).await {
                        Ok(()) => result.record(SyncAction::CreateLocalFolder(entry.path.clone())),
                        Err(err) => result.record_error("create local folder", &entry.path, &err),
                    }
                }
            }
            EntryKind::File { modified, .. } => {
                let local_modified = state.modified;
                if !state.exists {
                    info!(path = %entry.path, "Found new file on remote, downloading");
                    self.download(&entry.path, local, false, result).await;
                } else if local_modified.is_some_and(|local_time| *modified > local_time) {
                    info!(path = %entry.path, "Found updated file on remote, downloading");
                    self.download(&entry.path, local, true, result).await;
                } else if local_modified.is_some_and(|local_time| local_time > *modified) {
                    info!(path = %entry.path, "Local file has been updated, uploading");
                    self.upload(local, &entry.path, &state, result).await;
                } else {
                    debug!(path = %entry.path, "Unchanged");
                }
            }
        }
    }

    /// Handles a local item the remote folder does not list
    async fn reconcile_local_only(
        &self,
        ctx: &mut RunContext,
        local: &Path,
        remote: &RemotePath,
        result: &mut SyncResult,
    ) -> Result<()> {
        let state = match self.local_filesystem.get_state(local).await {
            Ok(state) => state,
            Err(err) => {
                result.record_error("stat", &local.display(), &err);
                return Ok(());
            }
        };

        if self.deleted_remotely(ctx, remote, state.modified).await? {
            info!(path = %remote, "Found local item that is deleted on remote, trashing");
            match self.local_filesystem.trash(local).await {
                Ok(()) => result.record(SyncAction::TrashLocal(local.to_path_buf())),
                Err(err) => result.record_error("trash", &local.display(), &err),
            }
        } else if state.is_directory() {
            info!(path = %remote, "Found local folder that isn't on remote, creating");
            match self.remote.create_folder(remote).await {
                Ok(()) => result.record(SyncAction::CreateRemoteFolder(remote.clone())),
                Err(err) => result.record_error("create remote folder", remote, &err),
            }
        } else {
            info!(path = %remote, "Found local file that isn't on remote, uploading");
            self.upload(local, remote, &state, result).await;
        }

        Ok(())
    }

    /// Deletion gate: every condition must hold before a local item is trashed
    ///
    /// The remote deletion list is consulted last; it costs a request and is
    /// only fetched once the cheap conditions already hold.
    async fn deleted_remotely(
        &self,
        ctx: &mut RunContext,
        remote: &RemotePath,
        local_modified: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let Some(local_modified) = local_modified else {
            return Ok(false);
        };
        if !ctx.previous.ran_after(local_modified) {
            debug!(path = %remote, "Modified since last run, not a remote deletion");
            return Ok(false);
        }
        if !ctx
            .previous
            .is_recent(Utc::now(), self.policy.lookback_window)
        {
            debug!(path = %remote, "Last run too long ago to trust, not a remote deletion");
            return Ok(false);
        }
        if !self.policy.really_delete_local_files {
            debug!(path = %remote, "Local deletion disabled");
            return Ok(false);
        }

        let deleted = ctx
            .remote
            .remotely_deleted_since(&ctx.previous.cursor)
            .await
            .context("Failed to fetch remote deletions")?;
        Ok(deleted.contains(remote))
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    async fn download(
        &self,
        remote: &RemotePath,
        local: &Path,
        replace_existing: bool,
        result: &mut SyncResult,
    ) {
        match self.try_download(remote, local, replace_existing).await {
            Ok(()) => result.record(SyncAction::Download(remote.clone())),
            Err(err) => result.record_error("download", remote, &err),
        }
    }

    async fn try_download(
        &self,
        remote: &RemotePath,
        local: &Path,
        replace_existing: bool,
    ) -> Result<()> {
        // Never overwrite in place: the old copy goes to the trash first.
        if replace_existing {
            self.local_filesystem
                .trash(local)
                .await
                .with_context(|| format!("Failed to trash {} before download", local.display()))?;
        }

        let entry = self
            .remote
            .download_to_file(remote, local)
            .await
            .with_context(|| format!("Failed to download {remote}"))?;
        self.fix_local_time(&entry, local).await
    }

    /// Uploads `local` unless it is at or above the size ceiling
    async fn upload(
        &self,
        local: &Path,
        remote: &RemotePath,
        state: &FileSystemState,
        result: &mut SyncResult,
    ) {
        if !self.policy.size_allowed(state.size) {
            info!(
                path = %remote,
                size = state.size,
                max_file_size = self.policy.max_file_size,
                "File above max size, ignoring"
            );
            result.skipped_too_large.push(remote.clone());
            return;
        }

        match self.try_upload(local, remote).await {
            Ok(()) => result.record(SyncAction::Upload(remote.clone())),
            Err(err) => result.record_error("upload", remote, &err),
        }
    }

    async fn try_upload(&self, local: &Path, remote: &RemotePath) -> Result<()> {
        let data = self
            .local_filesystem
            .read_file(local)
            .await
            .with_context(|| format!("Failed to read {}", local.display()))?;
        let entry = self
            .remote
            .upload(&data, remote, true)
            .await
            .with_context(|| format!("Failed to upload {remote}"))?;
        self.fix_local_time(&entry, local).await
    }

    /// Sets the local mtime to the remote one so the next run sees them equal
    async fn fix_local_time(&self, entry: &RemoteEntry, local: &Path) -> Result<()> {
        let Some(modified) = entry.modified() else {
            return Ok(());
        };
        self.local_filesystem
            .set_modified(local, modified)
            .await
            .with_context(|| format!("Failed to set modification time of {}", local.display()))
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Persists cursor, run time, exclusions and the local snapshot
    ///
    /// The snapshot walk happens before either file is written so a walk
    /// failure leaves both untouched.
    #[tracing::instrument(skip_all)]
    async fn commit(&self) -> Result<()> {
        let cursor = self
            .remote
            .latest_cursor(&RemotePath::root(), true)
            .await
            .context("Failed to fetch latest remote cursor")?;
        let tree = self
            .tree_store
            .current_tree(self.policy.root.path(), &self.policy.exclusions)
            .await
            .context("Failed to walk local tree for snapshot")?;

        // Run state last: it marks the snapshot as belonging to this run.
        self.tree_store
            .commit(&tree)
            .await
            .context("Failed to persist local snapshot")?;
        self.run_state_store
            .commit(&cursor, &self.policy.exclusions)
            .await
            .context("Failed to persist run state")?;

        debug!(entries = tree.len(), "Run committed");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
