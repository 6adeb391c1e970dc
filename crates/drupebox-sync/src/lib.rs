//! Drupebox Sync - Bidirectional reconciliation engine
//!
//! Provides:
//! - Three-way reconciliation of a local tree against a remote tree
//! - Safety-gated propagation of deletions in both directions
//! - Staleness-bounded caching of the remote listing
//!
//! ## Modules
//!
//! - [`engine`] - Reconciliation engine (deletion propagation + folder walk)
//! - [`filesystem`] - Local filesystem adapter (trash, mtimes)
//! - [`local_tree`] - Local tree snapshots and deletion detection
//! - [`remote_cache`] - Cached full remote listing and remote deletions
//! - [`run_state`] - State carried from one run to the next

pub mod engine;
pub mod filesystem;
pub mod local_tree;
pub mod remote_cache;
pub mod run_state;

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the persistent stores and the tree walk
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The local tree walk failed part way through
    #[error("Failed to walk {path}: {reason}")]
    WalkFailed {
        /// Path at which the walk failed
        path: PathBuf,
        /// Underlying error
        reason: String,
    },

    /// A persisted state file could not be encoded
    #[error("Failed to encode state: {0}")]
    Encoding(#[from] serde_json::Error),

    /// A background task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A domain-level error propagated from drupebox-core
    #[error("Domain error: {0}")]
    DomainError(#[from] drupebox_core::domain::errors::DomainError),
}

/// Write `data` next to `target` and rename it into place
pub(crate) async fn write_atomically(target: &std::path::Path, data: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Same directory so the rename stays on one filesystem.
    let tmp_path = {
        let mut p = target.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };

    tokio::fs::write(&tmp_path, data).await?;
    tokio::fs::rename(&tmp_path, target).await?;
    Ok(())
}
