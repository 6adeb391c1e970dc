//! Local filesystem port (driven/secondary port)
//!
//! This module defines the interface for the local side of the sync.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - There is no delete operation: local removals always go through
//!   [`ILocalFileSystem::trash`], which must be recoverable.
//! - Directory walks for snapshots are not part of this port; they are done
//!   by the local tree snapshotter, which needs symlink-following semantics
//!   this trait does not model.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Snapshot of a path's state on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemState {
    /// Whether the file/directory exists on disk
    pub exists: bool,
    /// Whether this is a regular file (false for directories and other types)
    pub is_file: bool,
    /// Size in bytes (0 for directories or non-existent files)
    pub size: u64,
    /// Last modification time (None if not available or file doesn't exist)
    pub modified: Option<DateTime<Utc>>,
}

impl FileSystemState {
    /// Returns a state representing a non-existent path
    pub fn not_found() -> Self {
        Self {
            exists: false,
            is_file: false,
            size: 0,
            modified: None,
        }
    }

    /// Returns true if the file exists and is a regular file
    pub fn is_regular_file(&self) -> bool {
        self.exists && self.is_file
    }

    /// Returns true if the file exists and is a directory
    pub fn is_directory(&self) -> bool {
        self.exists && !self.is_file
    }
}

/// Port trait for local filesystem operations
///
/// ## Implementation Notes
///
/// - All paths are absolute.
/// - Symbolic links are followed for every operation except `trash`.
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Gets the current state of a file or directory
    ///
    /// Returns `FileSystemState::not_found()` if the path doesn't exist
    /// (does not return an error for missing paths).
    async fn get_state(&self, path: &Path) -> anyhow::Result<FileSystemState>;

    /// Lists the direct children of a directory, sorted by name
    async fn list_dir(&self, path: &Path) -> anyhow::Result<Vec<PathBuf>>;

    /// Reads the entire contents of a file
    async fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>>;

    /// Creates a directory and all parent directories as needed
    async fn create_directory(&self, path: &Path) -> anyhow::Result<()>;

    /// Sets access and modification time, truncated to whole seconds
    async fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> anyhow::Result<()>;

    /// Moves a file or directory somewhere recoverable
    async fn trash(&self, path: &Path) -> anyhow::Result<()>;
}
