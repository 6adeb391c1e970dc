//! DropboxStorage - IRemoteStorage implementation for the Dropbox API v2
//!
//! Wraps the [`DropboxClient`] and delegates to the [`files`](crate::files)
//! module to fulfil the [`IRemoteStorage`] port contract.
//!
//! ## Design Notes
//!
//! - Uses `tokio::sync::Mutex` because `IRemoteStorage` methods take `&self`
//!   while [`DropboxClient::set_access_token`] requires `&mut self`.
//! - Authentication is handled by [`DropboxAuth`]; [`DropboxStorage::connect`]
//!   trades a refresh token for an access token once, at startup.

use std::path::Path;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::debug;

use drupebox_core::domain::entry::{Cursor, DeleteOutcome, RemoteChange, RemoteEntry};
use drupebox_core::domain::paths::RemotePath;
use drupebox_core::ports::IRemoteStorage;

use crate::auth::DropboxAuth;
use crate::client::DropboxClient;
use crate::files;

// ============================================================================
// DropboxStorage
// ============================================================================

/// Dropbox-backed implementation of the remote storage port
pub struct DropboxStorage {
    client: Mutex<DropboxClient>,
}

impl DropboxStorage {
    pub fn new(client: DropboxClient) -> Self {
        Self {
            client: Mutex::new(client),
        }
    }

    /// Refreshes an access token and builds a storage around it
    pub async fn connect(auth: &DropboxAuth, refresh_token: &str) -> Result<Self> {
        let tokens = auth.refresh(refresh_token).await?;
        Ok(Self::new(DropboxClient::new(tokens.access_token)))
    }

    /// Replaces the bearer token used by subsequent calls
    pub async fn set_access_token(&self, token: impl Into<String>) {
        self.client.lock().await.set_access_token(token);
    }
}

#[async_trait::async_trait]
impl IRemoteStorage for DropboxStorage {
    async fn list_folder(&self, path: &RemotePath, recursive: bool) -> Result<Vec<RemoteEntry>> {
        let client = self.client.lock().await;
        debug!(path = %path, recursive, "DropboxStorage::list_folder");

        let mut entries = Vec::new();
        for metadata in files::list_folder(&client, path, recursive).await? {
            if let Some(entry) = metadata.to_entry()? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn upload(&self, data: &[u8], path: &RemotePath, overwrite: bool) -> Result<RemoteEntry> {
        let client = self.client.lock().await;
        debug!(path = %path, size = data.len(), overwrite, "DropboxStorage::upload");
        let metadata = files::upload(&client, data, path, overwrite).await?;
        Ok(metadata.to_entry()?)
    }

    async fn download_to_file(&self, path: &RemotePath, destination: &Path) -> Result<RemoteEntry> {
        let client = self.client.lock().await;
        debug!(path = %path, destination = %destination.display(), "DropboxStorage::download_to_file");
        let metadata = files::download_to_file(&client, path, destination).await?;
        Ok(metadata.to_entry()?)
    }

    async fn delete(&self, path: &RemotePath) -> Result<DeleteOutcome> {
        let client = self.client.lock().await;
        debug!(path = %path, "DropboxStorage::delete");
        files::delete(&client, path).await
    }

    async fn create_folder(&self, path: &RemotePath) -> Result<()> {
        let client = self.client.lock().await;
        debug!(path = %path, "DropboxStorage::create_folder");
        files::create_folder(&client, path).await?;
        Ok(())
    }

    async fn latest_cursor(&self, path: &RemotePath, recursive: bool) -> Result<Cursor> {
        let client = self.client.lock().await;
        debug!(path = %path, recursive, "DropboxStorage::latest_cursor");
        let cursor = files::get_latest_cursor(&client, path, recursive).await?;
        Ok(Cursor::new(cursor))
    }

    async fn list_changes(&self, cursor: &Cursor) -> Result<Vec<RemoteChange>> {
        if cursor.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.client.lock().await;
        debug!("DropboxStorage::list_changes");
        let changes = files::list_folder_continue(&client, cursor.as_str())
            .await?
            .iter()
            .map(|metadata| metadata.to_change())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(changes)
    }
}
