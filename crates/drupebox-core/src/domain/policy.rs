//! Sync policy and the skip predicate
//!
//! [`SyncPolicy`] is the read-only input to a run: where the local root is,
//! what to leave alone, how large a file may be uploaded, and whether local
//! deletions are allowed at all.

use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::paths::{ExclusionSet, SyncRoot};

/// Default size ceiling for uploads, in bytes
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10_000_000;

/// How long a previous run stays trustworthy for deletion gating
pub const DEFAULT_LOOKBACK_WINDOW: Duration = Duration::from_secs(2 * 60 * 60);

/// Maximum age of the cached remote listing
pub const DEFAULT_REMOTE_STALENESS: Duration = Duration::from_secs(60);

// ============================================================================
// IgnoreRules
// ============================================================================

/// Name-based denylist for temp files, VCS artifacts and OS metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreRules {
    /// Names starting with any of these are ignored
    pub prefixes: Vec<String>,
    /// Names ending with any of these are ignored
    pub suffixes: Vec<String>,
    /// Exact names that are ignored
    pub names: Vec<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            prefixes: vec![".fuse_hidden".to_string()],
            suffixes: vec![
                ".pyc".to_string(),
                "__pycache__".to_string(),
                ".git".to_string(),
            ],
            names: vec![
                ".DS_Store".to_string(),
                "._.DS_Store".to_string(),
                "DG1__DS_DIR_HDR".to_string(),
                "DG1__DS_VOL_HDR".to_string(),
            ],
        }
    }
}

impl IgnoreRules {
    /// Rules that ignore nothing
    #[must_use]
    pub fn none() -> Self {
        Self {
            prefixes: Vec::new(),
            suffixes: Vec::new(),
            names: Vec::new(),
        }
    }

    /// The first rule matching `name`, if any
    #[must_use]
    pub fn matching_rule(&self, name: &str) -> Option<SkipReason> {
        if let Some(prefix) = self.prefixes.iter().find(|p| name.starts_with(p.as_str())) {
            return Some(SkipReason::Prefix(prefix.clone()));
        }
        if let Some(suffix) = self.suffixes.iter().find(|s| name.ends_with(s.as_str())) {
            return Some(SkipReason::Suffix(suffix.clone()));
        }
        if self.names.iter().any(|n| n == name) {
            return Some(SkipReason::Name(name.to_string()));
        }
        None
    }
}

/// Why a local path is left out of reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Prefix(String),
    Suffix(String),
    Name(String),
    /// Inside a folder listed in the exclusion set
    Excluded,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix(p) => write!(f, "{p}* files"),
            Self::Suffix(s) => write!(f, "*{s} files"),
            Self::Name(n) => write!(f, "{n}"),
            Self::Excluded => write!(f, "excluded folder"),
        }
    }
}

// ============================================================================
// SyncPolicy
// ============================================================================

/// Everything the engine needs to know about user preferences for one run
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    pub root: SyncRoot,
    pub exclusions: ExclusionSet,
    pub ignore: IgnoreRules,
    /// Files of this size or larger are never uploaded
    pub max_file_size: u64,
    /// Master switch for trashing local items deleted remotely
    pub really_delete_local_files: bool,
    pub lookback_window: Duration,
    pub remote_staleness: Duration,
}

impl SyncPolicy {
    /// Policy with default limits and ignore rules for `root`
    #[must_use]
    pub fn new(root: SyncRoot) -> Self {
        Self {
            root,
            exclusions: ExclusionSet::default(),
            ignore: IgnoreRules::default(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            really_delete_local_files: false,
            lookback_window: DEFAULT_LOOKBACK_WINDOW,
            remote_staleness: DEFAULT_REMOTE_STALENESS,
        }
    }

    /// Why `local` should be skipped, if it should
    #[must_use]
    pub fn skip_reason(&self, local: &Path) -> Option<SkipReason> {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if let Some(reason) = self.ignore.matching_rule(&name) {
            return Some(reason);
        }
        if self.exclusions.excludes(local) {
            return Some(SkipReason::Excluded);
        }
        None
    }

    /// Skip predicate applied to every local counterpart during reconciliation
    #[must_use]
    pub fn should_skip(&self, local: &Path) -> bool {
        match self.skip_reason(local) {
            Some(reason) => {
                debug!(path = %local.display(), reason = %reason, "Ignoring");
                true
            }
            None => false,
        }
    }

    /// Whether a file of `size` bytes may be uploaded
    #[must_use]
    pub fn size_allowed(&self, size: u64) -> bool {
        size < self.max_file_size
    }
}
