//! File operations for the Dropbox API v2
//!
//! Provides functions for the endpoints reconciliation needs:
//! - [`list_folder`] / [`list_folder_continue`] - Listings and change feeds,
//!   following `has_more` until the last page
//! - [`get_latest_cursor`] - Cursor for the current state of a folder
//! - [`upload`] - Single-request upload
//! - [`download_to_file`] - Download written atomically to a local path
//! - [`delete`] - Delete, reporting a missing path as [`DeleteOutcome::NotFound`]
//! - [`create_folder`] - Folder creation
//!
//! ## Dropbox API References
//!
//! - [files/list_folder](https://www.dropbox.com/developers/documentation/http/documentation#files-list_folder)
//! - [files/upload](https://www.dropbox.com/developers/documentation/http/documentation#files-upload)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use drupebox_core::domain::entry::{DeleteOutcome, RemoteChange, RemoteEntry};
use drupebox_core::domain::paths::RemotePath;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::client::DropboxClient;
use crate::DropboxError;

// ============================================================================
// Dropbox metadata types for deserialization
// ============================================================================

/// Metadata of one object, as returned in listings and change feeds
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum Metadata {
    File(FileMetadata),
    Folder(FolderMetadata),
    Deleted(DeletedMetadata),
}

/// File metadata
#[derive(Debug, Clone, Deserialize)]
pub struct FileMetadata {
    /// Last path component
    pub name: String,
    /// Lowercased path
    pub path_lower: Option<String>,
    /// Path with the user's casing
    pub path_display: Option<String>,
    /// Modification time reported by the uploading client
    pub client_modified: DateTime<Utc>,
    /// Time the server received the content
    pub server_modified: Option<DateTime<Utc>>,
    /// Size in bytes
    pub size: u64,
    /// Revision identifier
    pub rev: Option<String>,
}

/// Folder metadata
#[derive(Debug, Clone, Deserialize)]
pub struct FolderMetadata {
    pub name: String,
    pub path_lower: Option<String>,
    pub path_display: Option<String>,
}

/// Deleted-object marker from a change feed
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedMetadata {
    pub name: String,
    pub path_lower: Option<String>,
    pub path_display: Option<String>,
}

/// Canonical path from `path_display`, falling back to `path_lower`
fn wire_path(display: Option<&str>, lower: Option<&str>) -> Result<RemotePath, DropboxError> {
    let raw = display
        .or(lower)
        .ok_or_else(|| DropboxError::InvalidResponse("Metadata without a path".to_string()))?;
    RemotePath::new(raw.to_string()).map_err(|e| DropboxError::InvalidResponse(e.to_string()))
}

impl FileMetadata {
    pub fn remote_path(&self) -> Result<RemotePath, DropboxError> {
        wire_path(self.path_display.as_deref(), self.path_lower.as_deref())
    }

    /// Port-level entry; the modification time is `client_modified`
    pub fn to_entry(&self) -> Result<RemoteEntry, DropboxError> {
        Ok(RemoteEntry::file(
            self.remote_path()?,
            self.client_modified,
            self.size,
        ))
    }
}

impl FolderMetadata {
    pub fn remote_path(&self) -> Result<RemotePath, DropboxError> {
        wire_path(self.path_display.as_deref(), self.path_lower.as_deref())
    }
}

impl Metadata {
    pub fn remote_path(&self) -> Result<RemotePath, DropboxError> {
        match self {
            Self::File(file) => file.remote_path(),
            Self::Folder(folder) => folder.remote_path(),
            Self::Deleted(deleted) => {
                wire_path(deleted.path_display.as_deref(), deleted.path_lower.as_deref())
            }
        }
    }

    /// Port-level entry, `None` for deletion markers
    pub fn to_entry(&self) -> Result<Option<RemoteEntry>, DropboxError> {
        match self {
            Self::File(file) => file.to_entry().map(Some),
            Self::Folder(folder) => Ok(Some(RemoteEntry::folder(folder.remote_path()?))),
            Self::Deleted(_) => Ok(None),
        }
    }

    /// Port-level change event
    pub fn to_change(&self) -> Result<RemoteChange, DropboxError> {
        match self.to_entry()? {
            Some(entry) => Ok(RemoteChange::Upserted(entry)),
            None => Ok(RemoteChange::Deleted(self.remote_path()?)),
        }
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Serialize)]
struct ListFolderArg<'a> {
    path: &'a str,
    recursive: bool,
    include_deleted: bool,
}

#[derive(Debug, Serialize)]
struct CursorArg<'a> {
    cursor: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListFolderResult {
    entries: Vec<Metadata>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct LatestCursorResult {
    cursor: String,
}

#[derive(Debug, Serialize)]
struct PathArg<'a> {
    path: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum WriteMode {
    Add,
    Overwrite,
}

#[derive(Debug, Serialize)]
struct UploadArg<'a> {
    path: &'a str,
    mode: WriteMode,
    autorename: bool,
    mute: bool,
}

#[derive(Debug, Serialize)]
struct CreateFolderArg<'a> {
    path: &'a str,
    autorename: bool,
}

#[derive(Debug, Deserialize)]
struct CreateFolderResult {
    metadata: FolderMetadata,
}

// ============================================================================
// Listings and cursors
// ============================================================================

/// Lists `path` (the root is `""`), following every continuation page
pub async fn list_folder(
    client: &DropboxClient,
    path: &RemotePath,
    recursive: bool,
) -> Result<Vec<Metadata>> {
    let arg = ListFolderArg {
        path: path.as_str(),
        recursive,
        include_deleted: false,
    };
    let first: ListFolderResult = client
        .rpc("files/list_folder", &arg)
        .await
        .with_context(|| format!("Failed to list folder '{path}'"))?;

    let mut entries = first.entries;
    if first.has_more {
        entries.extend(list_folder_continue(client, &first.cursor).await?);
    }

    debug!(path = %path, recursive, count = entries.len(), "Folder listed");
    Ok(entries)
}

/// Every change recorded after `cursor`, across all pages
pub async fn list_folder_continue(client: &DropboxClient, cursor: &str) -> Result<Vec<Metadata>> {
    let mut entries = Vec::new();
    let mut cursor = cursor.to_string();
    let mut pages = 0u32;

    loop {
        let page: ListFolderResult = client
            .rpc("files/list_folder/continue", &CursorArg { cursor: &cursor })
            .await
            .context("Failed to continue folder listing")?;
        pages += 1;
        entries.extend(page.entries);
        if !page.has_more {
            break;
        }
        cursor = page.cursor;
    }

    debug!(pages, count = entries.len(), "Continuation pages fetched");
    Ok(entries)
}

/// Cursor describing the current state of `path`
pub async fn get_latest_cursor(
    client: &DropboxClient,
    path: &RemotePath,
    recursive: bool,
) -> Result<String> {
    let arg = ListFolderArg {
        path: path.as_str(),
        recursive,
        include_deleted: false,
    };
    let result: LatestCursorResult = client
        .rpc("files/list_folder/get_latest_cursor", &arg)
        .await
        .context("Failed to get latest cursor")?;
    Ok(result.cursor)
}

// ============================================================================
// Transfers
// ============================================================================

/// Uploads `data` to `path` in one request
///
/// `overwrite` replaces an existing file; otherwise the upload fails with a
/// conflict if the path is taken.
pub async fn upload(
    client: &DropboxClient,
    data: &[u8],
    path: &RemotePath,
    overwrite: bool,
) -> Result<FileMetadata> {
    let arg = UploadArg {
        path: path.as_str(),
        mode: if overwrite {
            WriteMode::Overwrite
        } else {
            WriteMode::Add
        },
        autorename: false,
        mute: true,
    };
    let metadata: FileMetadata = client
        .upload("files/upload", &arg, data)
        .await
        .with_context(|| format!("Failed to upload {path}"))?;

    info!(path = %path, bytes = data.len(), "Upload complete");
    Ok(metadata)
}

/// Temporary name next to `destination`, hidden from casual listings
fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{name}.drupebox-partial"))
}

/// Downloads `path` into `destination`
///
/// The content is written to a temporary file in the same folder and
/// renamed into place once complete.
pub async fn download_to_file(
    client: &DropboxClient,
    path: &RemotePath,
    destination: &Path,
) -> Result<FileMetadata> {
    let (metadata, mut response): (FileMetadata, _) = client
        .download("files/download", &PathArg { path: path.as_str() })
        .await
        .with_context(|| format!("Failed to download {path}"))?;

    let partial = partial_path(destination);
    let written = async {
        let mut file = tokio::fs::File::create(&partial)
            .await
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        let mut bytes = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed to read download body of {path}"))?
        {
            file.write_all(&chunk).await?;
            bytes += chunk.len();
        }
        file.flush().await?;
        anyhow::Ok(bytes)
    }
    .await;

    let bytes = match written {
        Ok(bytes) => bytes,
        Err(err) => {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err);
        }
    };

    tokio::fs::rename(&partial, destination)
        .await
        .with_context(|| format!("Failed to move download into {}", destination.display()))?;

    info!(path = %path, bytes, "Download complete");
    Ok(metadata)
}

// ============================================================================
// Deletes and folders
// ============================================================================

/// Deletes `path` and everything below it
pub async fn delete(client: &DropboxClient, path: &RemotePath) -> Result<DeleteOutcome> {
    let result: Result<serde_json::Value, DropboxError> = client
        .rpc("files/delete_v2", &PathArg { path: path.as_str() })
        .await;

    match result {
        Ok(_) => {
            info!(path = %path, "Deleted");
            Ok(DeleteOutcome::Deleted)
        }
        Err(DropboxError::NotFound(summary)) => {
            debug!(path = %path, summary, "Nothing to delete");
            Ok(DeleteOutcome::NotFound)
        }
        Err(err) => Err(err).with_context(|| format!("Failed to delete {path}")),
    }
}

/// Creates the folder at `path`
pub async fn create_folder(client: &DropboxClient, path: &RemotePath) -> Result<FolderMetadata> {
    let arg = CreateFolderArg {
        path: path.as_str(),
        autorename: false,
    };
    let result: CreateFolderResult = client
        .rpc("files/create_folder_v2", &arg)
        .await
        .with_context(|| format!("Failed to create folder {path}"))?;

    info!(path = %path, "Folder created");
    Ok(result.metadata)
}

// ============================================================================
// Tests
// ============================================================================
