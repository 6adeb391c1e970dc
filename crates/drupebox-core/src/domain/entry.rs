//! Remote entries and change events
//!
//! These are the values exchanged with the remote storage port. They carry
//! only what reconciliation needs: the canonical path, whether the object is
//! a file or a folder, and for files the modification time and size.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::paths::RemotePath;

/// Whether a remote object is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryKind {
    File {
        /// Client-side modification time, second resolution
        modified: DateTime<Utc>,
        /// Size in bytes
        size: u64,
    },
    Folder,
}

/// One object in the remote tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub path: RemotePath,
    #[serde(flatten)]
    pub kind: EntryKind,
}

impl RemoteEntry {
    #[must_use]
    pub fn file(path: RemotePath, modified: DateTime<Utc>, size: u64) -> Self {
        Self {
            path,
            kind: EntryKind::File { modified, size },
        }
    }

    #[must_use]
    pub fn folder(path: RemotePath) -> Self {
        Self {
            path,
            kind: EntryKind::Folder,
        }
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File { .. })
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, EntryKind::Folder)
    }

    /// Modification time for files, `None` for folders
    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            EntryKind::File { modified, .. } => Some(modified),
            EntryKind::Folder => None,
        }
    }

    /// The folder this entry lives in
    #[must_use]
    pub fn parent(&self) -> Option<RemotePath> {
        self.path.parent()
    }
}

/// One event from the remote change feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChange {
    /// The object at this path was removed
    Deleted(RemotePath),
    /// The object was added or modified
    Upserted(RemoteEntry),
}

impl RemoteChange {
    /// The path of a deletion, `None` for additions and modifications
    #[must_use]
    pub fn deleted_path(&self) -> Option<&RemotePath> {
        match self {
            Self::Deleted(path) => Some(path),
            Self::Upserted(_) => None,
        }
    }
}

/// Outcome of a remote delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing existed at the path
    NotFound,
}

/// Opaque position in the remote change history
///
/// The empty cursor means "no baseline": no deletions can be derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
