//! Remote storage port (driven/secondary port)
//!
//! This module defines the interface for the remote side of the sync: a
//! hierarchical object store addressed by canonical [`RemotePath`]s, with a
//! cursor-based change feed.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification. The one outcome the engine
//!   must distinguish, deleting something that is already gone, is a
//!   [`DeleteOutcome`] value rather than an error.
//! - Uses `#[async_trait]` for async trait methods.
//! - Listing and change-feed methods return every page; pagination is the
//!   adapter's business.

use std::path::Path;

use crate::domain::entry::{Cursor, DeleteOutcome, RemoteChange, RemoteEntry};
use crate::domain::paths::RemotePath;

/// Port trait for remote storage operations
///
/// ## Implementation Notes
///
/// - No method retries internally; a failure is reported to the caller,
///   which decides whether it is fatal for the run.
/// - Returned entries always carry canonical paths in display case.
#[async_trait::async_trait]
pub trait IRemoteStorage: Send + Sync {
    /// Lists the children of a folder, or its whole subtree when `recursive`
    ///
    /// The folder itself is not part of the result.
    async fn list_folder(
        &self,
        path: &RemotePath,
        recursive: bool,
    ) -> anyhow::Result<Vec<RemoteEntry>>;

    /// Uploads `data` to `path`
    ///
    /// With `overwrite` an existing file is replaced; otherwise the call
    /// fails if something already exists at `path`.
    ///
    /// # Returns
    /// Metadata of the stored file, including its modification time
    async fn upload(
        &self,
        data: &[u8],
        path: &RemotePath,
        overwrite: bool,
    ) -> anyhow::Result<RemoteEntry>;

    /// Downloads the file at `path` into `destination`
    ///
    /// `destination` must not exist; its parent folder must.
    ///
    /// # Returns
    /// Metadata of the downloaded file
    async fn download_to_file(
        &self,
        path: &RemotePath,
        destination: &Path,
    ) -> anyhow::Result<RemoteEntry>;

    /// Deletes the file or folder (recursively) at `path`
    async fn delete(&self, path: &RemotePath) -> anyhow::Result<DeleteOutcome>;

    /// Creates a folder at `path`
    async fn create_folder(&self, path: &RemotePath) -> anyhow::Result<()>;

    /// Returns a cursor marking the current state of the tree at `path`
    async fn latest_cursor(&self, path: &RemotePath, recursive: bool) -> anyhow::Result<Cursor>;

    /// Lists every change recorded since `cursor`
    async fn list_changes(&self, cursor: &Cursor) -> anyhow::Result<Vec<RemoteChange>>;
}
