//! Shared fixtures for engine behaviour tests
//!
//! [`FakeRemote`] keeps a remote tree in memory and logs every call so tests
//! can assert on exactly what a run did. [`Harness`] owns the temporary sync
//! root, state directory and trash directory.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use drupebox_core::domain::entry::{Cursor, DeleteOutcome, RemoteChange, RemoteEntry};
use drupebox_core::domain::paths::{ExclusionSet, RemotePath, SyncRoot};
use drupebox_core::domain::policy::SyncPolicy;
use drupebox_core::ports::remote_storage::IRemoteStorage;
use drupebox_sync::engine::SyncEngine;
use drupebox_sync::filesystem::LocalFileSystemAdapter;
use drupebox_sync::run_state::RunStateStore;

/// Modification time the fake stamps on every upload
pub const UPLOAD_TIME: i64 = 1_700_000_000;

pub fn remote_path(p: &str) -> RemotePath {
    RemotePath::new(p.to_string()).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

// ============================================================================
// FakeRemote
// ============================================================================

#[derive(Default)]
struct RemoteState {
    entries: BTreeMap<String, RemoteEntry>,
    contents: BTreeMap<String, Vec<u8>>,
    /// Change log; a cursor is an index into it
    changes: Vec<RemoteChange>,
    calls: Vec<String>,
    fail_listing: bool,
    fail_uploads: BTreeSet<String>,
    fail_deletes: BTreeSet<String>,
}

/// In-memory remote tree
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<RemoteState>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_file(&self, path: &str, modified: DateTime<Utc>, content: &[u8]) {
        let entry = RemoteEntry::file(remote_path(path), modified, content.len() as u64);
        let mut state = self.state.lock().unwrap();
        state.entries.insert(path.to_string(), entry.clone());
        state.contents.insert(path.to_string(), content.to_vec());
        state.changes.push(RemoteChange::Upserted(entry));
    }

    pub fn add_folder(&self, path: &str) {
        let entry = RemoteEntry::folder(remote_path(path));
        let mut state = self.state.lock().unwrap();
        state.entries.insert(path.to_string(), entry.clone());
        state.changes.push(RemoteChange::Upserted(entry));
    }

    /// Delete `path` and everything below it, as another client would
    pub fn remove(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        remove_subtree(&mut state, path);
    }

    /// Cursor at the current end of the change log
    pub fn cursor_now(&self) -> Cursor {
        Cursor::new(self.state.lock().unwrap().changes.len().to_string())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().unwrap().entries.contains_key(path)
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().contents.get(path).cloned()
    }

    pub fn modified(&self, path: &str) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .unwrap()
            .entries
            .get(path)
            .and_then(RemoteEntry::modified)
    }

    /// Calls made so far, e.g. `upload /notes.txt`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change something on either side
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| {
                ["upload", "download", "delete", "create_folder"]
                    .iter()
                    .any(|op| call.starts_with(&format!("{op} ")))
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    pub fn fail_upload(&self, path: &str) {
        self.state.lock().unwrap().fail_uploads.insert(path.to_string());
    }

    pub fn fail_delete(&self, path: &str) {
        self.state.lock().unwrap().fail_deletes.insert(path.to_string());
    }
}

fn remove_subtree(state: &mut RemoteState, path: &str) {
    let prefix = format!("{path}/");
    let doomed: Vec<String> = state
        .entries
        .keys()
        .filter(|key| key.as_str() == path || key.starts_with(&prefix))
        .cloned()
        .collect();
    for key in doomed {
        state.entries.remove(&key);
        state.contents.remove(&key);
        state.changes.push(RemoteChange::Deleted(remote_path(&key)));
    }
}

#[async_trait::async_trait]
impl IRemoteStorage for FakeRemote {
    async fn list_folder(&self, folder: &RemotePath, recursive: bool) -> Result<Vec<RemoteEntry>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("list_folder {folder}"));
        if state.fail_listing {
            return Err(anyhow!("Server error: 503 Service Unavailable"));
        }
        Ok(state
            .entries
            .values()
            .filter(|entry| recursive || entry.parent().as_ref() == Some(folder))
            .cloned()
            .collect())
    }

    async fn upload(&self, data: &[u8], path: &RemotePath, _overwrite: bool) -> Result<RemoteEntry> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("upload {path}"));
        if state.fail_uploads.contains(path.as_str()) {
            return Err(anyhow!("Server error: 500 Internal Server Error"));
        }
        let entry = RemoteEntry::file(path.clone(), at(UPLOAD_TIME), data.len() as u64);
        state.entries.insert(path.to_string(), entry.clone());
        state.contents.insert(path.to_string(), data.to_vec());
        state.changes.push(RemoteChange::Upserted(entry.clone()));
        Ok(entry)
    }

    async fn download_to_file(&self, path: &RemotePath, destination: &Path) -> Result<RemoteEntry> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("download {path}"));
        let entry = state
            .entries
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("Not found: {path}"))?;
        let content = state.contents.get(path.as_str()).cloned().unwrap_or_default();
        std::fs::write(destination, content)?;
        Ok(entry)
    }

    async fn delete(&self, path: &RemotePath) -> Result<DeleteOutcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete {path}"));
        if state.fail_deletes.contains(path.as_str()) {
            return Err(anyhow!("Too many requests (429)"));
        }
        if !state.entries.contains_key(path.as_str()) {
            return Ok(DeleteOutcome::NotFound);
        }
        remove_subtree(&mut state, path.as_str());
        Ok(DeleteOutcome::Deleted)
    }

    async fn create_folder(&self, path: &RemotePath) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create_folder {path}"));
        let entry = RemoteEntry::folder(path.clone());
        state.entries.insert(path.to_string(), entry.clone());
        state.changes.push(RemoteChange::Upserted(entry));
        Ok(())
    }

    async fn latest_cursor(&self, _path: &RemotePath, _recursive: bool) -> Result<Cursor> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("latest_cursor".to_string());
        Ok(Cursor::new(state.changes.len().to_string()))
    }

    async fn list_changes(&self, cursor: &Cursor) -> Result<Vec<RemoteChange>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list_changes".to_string());
        let from: usize = cursor.as_str().parse()?;
        Ok(state.changes.get(from..).unwrap_or_default().to_vec())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Temporary sync root, state directory and trash, plus a fake remote
pub struct Harness {
    pub root: TempDir,
    pub state: TempDir,
    pub trash: TempDir,
    pub remote: Arc<FakeRemote>,
    pub policy: SyncPolicy,
}

impl Harness {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let policy = SyncPolicy::new(SyncRoot::new(root.path().to_path_buf()).unwrap());
        Self {
            root,
            state: TempDir::new().unwrap(),
            trash: TempDir::new().unwrap(),
            remote: FakeRemote::new(),
            policy,
        }
    }

    /// Engine over the current policy
    pub fn engine(&self) -> SyncEngine {
        let local = LocalFileSystemAdapter::with_trash_dir(self.trash.path().to_path_buf());
        SyncEngine::new(
            self.remote.clone(),
            Arc::new(local),
            self.policy.clone(),
            self.state.path(),
        )
    }

    pub fn local(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub fn exclude(&mut self, relative: &str) {
        self.policy.exclusions = ExclusionSet::new([self.local(relative)]);
    }

    /// Write a local file, creating parent folders
    pub fn write_local(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.local(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn read_local(&self, relative: &str) -> Vec<u8> {
        std::fs::read(self.local(relative)).unwrap()
    }

    pub fn trashed(&self, name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.trash.path().join(name)).ok()
    }

    /// Pretend the previous run finished at `finished_at` with `cursor`
    pub async fn record_previous_run(&self, cursor: &Cursor, finished_at: DateTime<Utc>) {
        RunStateStore::new(self.state.path())
            .commit_at(cursor, &self.policy.exclusions, finished_at)
            .await
            .unwrap();
    }
}

pub fn set_mtime(path: &Path, when: DateTime<Utc>) {
    let time = UNIX_EPOCH + Duration::from_secs(when.timestamp() as u64);
    let file = std::fs::File::open(path).unwrap();
    file.set_times(FileTimes::new().set_modified(time)).unwrap();
}

pub fn mtime(path: &Path) -> DateTime<Utc> {
    let modified = std::fs::metadata(path).unwrap().modified().unwrap();
    let secs = modified.duration_since(UNIX_EPOCH).unwrap().as_secs();
    at(secs as i64)
}
