//! Local tree snapshots
//!
//! A snapshot is the set of every file and folder below the sync root,
//! excluding pruned folders. The snapshot taken at the end of one run is
//! compared with the tree at the start of the next to find items the user
//! deleted locally in between.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use drupebox_core::domain::paths::ExclusionSet;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{write_atomically, SyncError};

/// File name of the persisted snapshot inside the state directory
pub const SNAPSHOT_FILE_NAME: &str = "drupebox_last_seen_files";

/// Every local file and folder seen during one walk
pub type LocalTree = BTreeSet<PathBuf>;

/// Walk `root`, following symlinks, pruning excluded folders
///
/// The root itself is not part of the result. Any error aborts the walk;
/// a partial tree would make missing items look deleted.
pub fn walk_tree(root: &Path, exclusions: &ExclusionSet) -> Result<LocalTree, SyncError> {
    let mut tree = LocalTree::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            let pruned = entry.file_type().is_dir() && exclusions.contains_folder(entry.path());
            if pruned {
                debug!(path = %entry.path().display(), "Pruning excluded folder");
            }
            !pruned
        });

    for entry in walker {
        let entry = entry.map_err(|err| SyncError::WalkFailed {
            path: err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            reason: err.to_string(),
        })?;
        tree.insert(entry.into_path());
    }

    Ok(tree)
}

/// Paths present in `previous` but gone from `current`, deepest first
///
/// Deleting in this order removes a file before the folder containing it.
pub fn locally_deleted_since(previous: &LocalTree, current: &LocalTree) -> Vec<PathBuf> {
    let mut deleted: Vec<PathBuf> = previous.difference(current).cloned().collect();
    deleted.sort_by(|a, b| {
        b.as_os_str()
            .len()
            .cmp(&a.as_os_str().len())
            .then_with(|| a.cmp(b))
    });
    deleted
}

/// Loads and persists the snapshot file
#[derive(Debug, Clone)]
pub struct LocalTreeStore {
    snapshot_path: PathBuf,
}

impl LocalTreeStore {
    /// Store keeping its snapshot in `state_dir`
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            snapshot_path: state_dir.join(SNAPSHOT_FILE_NAME),
        }
    }

    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Walk the live tree on a blocking thread
    pub async fn current_tree(
        &self,
        root: &Path,
        exclusions: &ExclusionSet,
    ) -> Result<LocalTree, SyncError> {
        let root = root.to_path_buf();
        let exclusions = exclusions.clone();
        let tree = tokio::task::spawn_blocking(move || walk_tree(&root, &exclusions)).await??;
        debug!(entries = tree.len(), "Local tree walked");
        Ok(tree)
    }

    /// The snapshot committed by the previous run, empty on first run
    pub async fn previous_tree(&self) -> Result<LocalTree, SyncError> {
        let content = match tokio::fs::read_to_string(&self.snapshot_path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.snapshot_path.display(), "No previous local snapshot");
                return Ok(LocalTree::new());
            }
            Err(err) => return Err(err.into()),
        };

        Ok(content
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    /// Replace the persisted snapshot with `tree`
    pub async fn commit(&self, tree: &LocalTree) -> Result<(), SyncError> {
        let mut content = String::new();
        for (i, path) in tree.iter().enumerate() {
            if i > 0 {
                content.push('\n');
            }
            content.push_str(&path.to_string_lossy());
        }
        write_atomically(&self.snapshot_path, content.as_bytes()).await?;
        debug!(entries = tree.len(), path = %self.snapshot_path.display(), "Local snapshot committed");
        Ok(())
    }
}
