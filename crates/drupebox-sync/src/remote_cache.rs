//! Cached full remote listing
//!
//! One recursive listing of the whole remote tree answers every
//! "what is in this folder" question during a run. The listing is trusted
//! for a fixed window; the first read after the window re-fetches it before
//! answering, so no decision is made on data older than that.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use drupebox_core::domain::entry::{Cursor, RemoteEntry};
use drupebox_core::domain::paths::RemotePath;
use drupebox_core::ports::remote_storage::IRemoteStorage;
use tokio::time::Instant;
use tracing::{debug, info};

/// Folder key; Dropbox paths are case-insensitive
fn folder_key(path: &RemotePath) -> String {
    path.as_str().to_lowercase()
}

/// Remote tree cache scoped to a single run
pub struct RemoteTreeCache {
    storage: Arc<dyn IRemoteStorage + Send + Sync>,
    staleness: Duration,
    /// Children keyed by parent folder
    children: HashMap<String, Vec<RemoteEntry>>,
    refreshed_at: Option<Instant>,
    refresh_count: u32,
    deletions: Option<Vec<RemotePath>>,
}

impl RemoteTreeCache {
    pub fn new(storage: Arc<dyn IRemoteStorage + Send + Sync>, staleness: Duration) -> Self {
        Self {
            storage,
            staleness,
            children: HashMap::new(),
            refreshed_at: None,
            refresh_count: 0,
            deletions: None,
        }
    }

    /// How many full listings have been fetched so far
    pub fn refresh_count(&self) -> u32 {
        self.refresh_count
    }

    /// Direct children of `folder`
    pub async fn list_folder(&mut self, folder: &RemotePath) -> Result<Vec<RemoteEntry>> {
        self.refresh_if_stale().await?;
        Ok(self
            .children
            .get(&folder_key(folder))
            .cloned()
            .unwrap_or_default())
    }

    /// Re-fetch the full listing if it was never fetched or has expired
    pub async fn refresh_if_stale(&mut self) -> Result<()> {
        let stale = match self.refreshed_at {
            None => true,
            Some(at) => at.elapsed() > self.staleness,
        };
        if !stale {
            return Ok(());
        }

        if self.refreshed_at.is_some() {
            info!(
                staleness_secs = self.staleness.as_secs(),
                "Remote listing expired, fetching again"
            );
        }

        let entries = self
            .storage
            .list_folder(&RemotePath::root(), true)
            .await
            .context("Failed to list remote tree")?;

        let mut children: HashMap<String, Vec<RemoteEntry>> = HashMap::new();
        for entry in entries {
            let Some(parent) = entry.parent() else {
                continue;
            };
            children.entry(folder_key(&parent)).or_default().push(entry);
        }

        self.children = children;
        self.refreshed_at = Some(Instant::now());
        self.refresh_count += 1;
        debug!(
            folders = self.children.len(),
            refresh = self.refresh_count,
            "Remote listing cached"
        );
        Ok(())
    }

    /// Paths deleted on the remote since `cursor`
    ///
    /// Empty for an empty cursor. Fetched once, then reused for the rest of
    /// the run.
    pub async fn remotely_deleted_since(&mut self, cursor: &Cursor) -> Result<&[RemotePath]> {
        if self.deletions.is_none() {
            let deletions = if cursor.is_empty() {
                debug!("No cursor from a previous run, no remote deletions known");
                Vec::new()
            } else {
                info!("Scanning for remotely deleted items since last run");
                let changes = self
                    .storage
                    .list_changes(cursor)
                    .await
                    .context("Failed to list remote changes since last run")?;
                let deleted: Vec<RemotePath> = changes
                    .iter()
                    .filter_map(|change| change.deleted_path().cloned())
                    .collect();
                for path in &deleted {
                    info!(path = %path, "Deleted on remote since last run");
                }
                deleted
            };
            self.deletions = Some(deletions);
        }

        Ok(self.deletions.as_deref().unwrap_or_default())
    }
}
