//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **No hard deletes**: [`ILocalFileSystem::trash`] either hands the path to
//!   the desktop trash (via the `trash` crate) or renames it into a configured
//!   directory. Nothing is ever unlinked.
//! - **Modification times**: Set through `std::fs::File::set_times` on a
//!   blocking thread, truncated to whole seconds so they compare equal to
//!   remote timestamps.

use std::fs::FileTimes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use anyhow::Context;
use chrono::{DateTime, Utc};
use drupebox_core::ports::local_filesystem::{FileSystemState, ILocalFileSystem};
use tracing::{debug, instrument};

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Where trashed items go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrashTarget {
    /// The desktop environment's trash (freedesktop.org Trash on Linux)
    Desktop,
    /// A plain directory; must be on the same filesystem as the sync root
    Directory(PathBuf),
}

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileSystemAdapter {
    trash: TrashTarget,
}

impl LocalFileSystemAdapter {
    /// Create an adapter that trashes into the desktop trash.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trash: TrashTarget::Desktop,
        }
    }

    /// Create an adapter that moves trashed items into `dir`.
    #[must_use]
    pub fn with_trash_dir(dir: PathBuf) -> Self {
        Self {
            trash: TrashTarget::Directory(dir),
        }
    }

    #[must_use]
    pub fn trash_target(&self) -> &TrashTarget {
        &self.trash
    }
}

impl Default for LocalFileSystemAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// First name under `dir` not already taken: `name`, `name.1`, `name.2`, ...
fn free_slot(dir: &Path, name: &std::ffi::OsStr) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let mut n: u32 = 1;
    loop {
        let mut numbered = name.to_owned();
        numbered.push(format!(".{n}"));
        let candidate = dir.join(numbered);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Whole seconds; the fraction is dropped so local and remote times compare
/// at the same resolution.
fn to_datetime(st: std::time::SystemTime) -> Option<DateTime<Utc>> {
    st.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|dur| DateTime::from_timestamp(dur.as_secs() as i64, 0))
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn get_state(&self, path: &Path) -> anyhow::Result<FileSystemState> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("path not found");
                return Ok(FileSystemState::not_found());
            }
            Err(e) => return Err(e.into()),
        };

        let is_file = metadata.is_file();
        let size = if is_file { metadata.len() } else { 0 };
        let modified = metadata.modified().ok().and_then(to_datetime);

        debug!(exists = true, is_file, size, "state retrieved");

        Ok(FileSystemState {
            exists: true,
            is_file,
            size,
            modified,
        })
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn list_dir(&self, path: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(path)
            .await
            .with_context(|| format!("Failed to read directory: {}", path.display()))?;

        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            children.push(entry.path());
        }
        children.sort();
        debug!(count = children.len(), "directory listed");
        Ok(children)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(path).await?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create_directory(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path).await?;
        debug!("directory created");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> anyhow::Result<()> {
        let secs = u64::try_from(modified.timestamp())
            .with_context(|| format!("Modification time before 1970: {modified}"))?;
        let time = UNIX_EPOCH + Duration::from_secs(secs);
        let target = path.to_path_buf();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let file = std::fs::File::open(&target)?;
            file.set_times(FileTimes::new().set_accessed(time).set_modified(time))
        })
        .await??;

        debug!(%modified, "modification time set");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn trash(&self, path: &Path) -> anyhow::Result<()> {
        match &self.trash {
            TrashTarget::Desktop => {
                let target = path.to_path_buf();
                tokio::task::spawn_blocking(move || trash::delete(&target))
                    .await?
                    .with_context(|| format!("Failed to move {} to trash", path.display()))?;
                debug!("moved to desktop trash");
            }
            TrashTarget::Directory(dir) => {
                let name = path
                    .file_name()
                    .with_context(|| format!("Cannot trash {}", path.display()))?;
                tokio::fs::create_dir_all(dir).await?;
                let destination = free_slot(dir, name);
                tokio::fs::rename(path, &destination).await.with_context(|| {
                    format!(
                        "Failed to move {} to {}",
                        path.display(),
                        destination.display()
                    )
                })?;
                debug!(destination = %destination.display(), "moved to trash directory");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
