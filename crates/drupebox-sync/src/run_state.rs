//! State carried from one run to the next
//!
//! Three values survive a run: when it finished, the remote cursor obtained
//! at its end, and the exclusion set it ran with. They are written together,
//! only after a run completes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use drupebox_core::domain::entry::Cursor;
use drupebox_core::domain::paths::ExclusionSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{write_atomically, SyncError};

/// File name of the persisted run state inside the state directory
pub const STATE_FILE_NAME: &str = "drupebox_last_state.json";

/// What the previous run left behind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(rename = "cursor_from_last_run")]
    pub cursor: Cursor,
    /// Seconds since the epoch; 0 when there was no previous run
    #[serde(rename = "time_from_last_run")]
    pub time: f64,
    #[serde(rename = "excluded_folder_paths_from_last_run")]
    pub exclusions: ExclusionSet,
}

impl RunState {
    /// When the previous run finished, `None` before the first run
    #[must_use]
    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        if self.time <= 0.0 {
            return None;
        }
        DateTime::from_timestamp_millis((self.time * 1000.0) as i64)
    }

    /// Whether the exclusion set differs from the one the previous run used
    #[must_use]
    pub fn exclusion_set_changed(&self, current: &ExclusionSet) -> bool {
        &self.exclusions != current
    }

    /// Whether the previous run finished after `modified`
    #[must_use]
    pub fn ran_after(&self, modified: DateTime<Utc>) -> bool {
        self.last_run_at().is_some_and(|last| last > modified)
    }

    /// Whether the previous run finished less than `window` before `now`
    #[must_use]
    pub fn is_recent(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let Some(last) = self.last_run_at() else {
            return false;
        };
        match chrono::Duration::from_std(window) {
            Ok(window) => now - last < window,
            Err(_) => true,
        }
    }
}

/// Loads and persists [`RunState`] as JSON
#[derive(Debug, Clone)]
pub struct RunStateStore {
    path: PathBuf,
}

impl RunStateStore {
    /// Store keeping its file in `state_dir`
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(STATE_FILE_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous run's state
    ///
    /// A missing file means first run. An unreadable one is treated the
    /// same way: starting from scratch only disables deletion shortcuts.
    pub async fn load(&self) -> Result<RunState, SyncError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No previous run state, treating as first run");
                return Ok(RunState::default());
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str::<RunState>(&content) {
            Ok(state) => {
                debug!(
                    last_run = state.time,
                    has_cursor = !state.cursor.is_empty(),
                    exclusions = state.exclusions.len(),
                    "Run state loaded"
                );
                Ok(state)
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Run state unreadable, treating as first run"
                );
                Ok(RunState::default())
            }
        }
    }

    /// Record a completed run ending now
    pub async fn commit(&self, cursor: &Cursor, exclusions: &ExclusionSet) -> Result<(), SyncError> {
        self.commit_at(cursor, exclusions, Utc::now()).await
    }

    /// Record a completed run ending at `finished_at`
    pub async fn commit_at(
        &self,
        cursor: &Cursor,
        exclusions: &ExclusionSet,
        finished_at: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let state = RunState {
            cursor: cursor.clone(),
            time: finished_at.timestamp_millis() as f64 / 1000.0,
            exclusions: exclusions.clone(),
        };
        let json = serde_json::to_vec_pretty(&state)?;
        write_atomically(&self.path, &json).await?;
        debug!(path = %self.path.display(), "Run state committed");
        Ok(())
    }
}
