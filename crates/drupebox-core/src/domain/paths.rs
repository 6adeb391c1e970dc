//! Path value types
//!
//! Remote storage paths and local filesystem paths follow different rules,
//! so they get different types:
//!
//! - [`RemotePath`] is the canonical storage path. The root is the empty
//!   string; every other path has exactly one leading `/` and no trailing `/`.
//! - [`SyncRoot`] owns the absolute local root and maps between the two.
//! - [`ExclusionSet`] holds excluded local folders, each stored with a
//!   trailing `/` so that `/foo/` can never match `/foobar/`.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// RemotePath
// ============================================================================

/// A canonical remote storage path
///
/// `""` is the root, `"/Photos/2024/beach.jpg"` is a file below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a RemotePath from an already canonical string
    ///
    /// # Errors
    /// Returns error if the path is not in canonical form
    pub fn new(path: String) -> Result<Self, DomainError> {
        if path.is_empty() {
            return Ok(Self::root());
        }

        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path must start with '/': {path}"
            )));
        }

        if path.ends_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path must not end with '/': {path}"
            )));
        }

        if path.contains("//") {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path contains invalid double slashes: {path}"
            )));
        }

        if path[1..].split('/').any(|c| c == "." || c == "..") {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path contains invalid traversal: {path}"
            )));
        }

        Ok(Self(path))
    }

    /// Bring any slash-separated path into canonical form
    ///
    /// `"/"` and `""` become the root, a missing leading slash is added,
    /// trailing and repeated slashes are dropped.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let mut normalized = String::with_capacity(raw.len() + 1);
        for component in raw.split('/').filter(|c| !c.is_empty()) {
            normalized.push('/');
            normalized.push_str(component);
        }
        Self(normalized)
    }

    /// The remote root (empty string)
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a single path component
    ///
    /// # Errors
    /// Returns error if component is empty, contains a slash, or is a
    /// traversal component
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        if component.is_empty() || component.contains('/') || component == "." || component == ".."
        {
            return Err(DomainError::InvalidRemotePath(format!(
                "Invalid path component: {component}"
            )));
        }

        Ok(Self(format!("{}/{component}", self.0)))
    }

    /// Get the parent path (`None` for the root)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        self.0.rfind('/').map(|idx| Self(self.0[..idx].to_string()))
    }

    /// Get the last path component (`None` for the root)
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }

        self.0.rsplit('/').next()
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

// ============================================================================
// SyncRoot
// ============================================================================

/// The absolute local directory mirrored to the remote root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRoot(PathBuf);

impl SyncRoot {
    /// Create a SyncRoot from an absolute path
    ///
    /// `.` components are dropped; `..` components are rejected.
    ///
    /// # Errors
    /// Returns error if the path is relative or contains `..`
    pub fn new(path: PathBuf) -> Result<Self, DomainError> {
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(format!(
                "Sync root must be absolute: {}",
                path.display()
            )));
        }

        let mut normalized = PathBuf::new();
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    return Err(DomainError::InvalidPath(format!(
                        "Sync root must not contain '..': {}",
                        path.display()
                    )));
                }
                Component::CurDir => {}
                other => normalized.push(other.as_os_str()),
            }
        }

        Ok(Self(normalized))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Map a local path under the root to its remote counterpart
    ///
    /// # Errors
    /// Returns error if `local` is not inside the root
    pub fn to_remote(&self, local: &Path) -> Result<RemotePath, DomainError> {
        let relative = local.strip_prefix(&self.0).map_err(|_| {
            DomainError::PathNotInSyncRoot(format!(
                "{} is not within {}",
                local.display(),
                self.0.display()
            ))
        })?;

        let mut remote = String::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    remote.push('/');
                    remote.push_str(&name.to_string_lossy());
                }
                Component::CurDir => {}
                _ => {
                    return Err(DomainError::InvalidPath(format!(
                        "Unexpected component in {}",
                        local.display()
                    )));
                }
            }
        }

        Ok(RemotePath(remote))
    }

    /// Map a remote path to its local counterpart under the root
    #[must_use]
    pub fn to_local(&self, remote: &RemotePath) -> PathBuf {
        if remote.is_root() {
            self.0.clone()
        } else {
            self.0.join(&remote.as_str()[1..])
        }
    }
}

impl Display for SyncRoot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for SyncRoot {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

// ============================================================================
// ExclusionSet
// ============================================================================

/// Render a local folder path with exactly one trailing `/`
#[must_use]
pub fn with_trailing_slash(path: &Path) -> String {
    let mut rendered = path.to_string_lossy().into_owned();
    if !rendered.ends_with('/') {
        rendered.push('/');
    }
    rendered
}

/// Set of excluded local folder prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ExclusionSet(BTreeSet<String>);

impl ExclusionSet {
    #[must_use]
    pub fn new<I, S>(folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        Self(
            folders
                .into_iter()
                .map(|folder| with_trailing_slash(folder.as_ref()))
                .collect(),
        )
    }

    /// Exact membership of the folder's trailing-slash form
    ///
    /// Used to prune the tree walk: an excluded folder is never entered.
    #[must_use]
    pub fn contains_folder(&self, folder: &Path) -> bool {
        self.0.contains(&with_trailing_slash(folder))
    }

    /// Whether `path` is an excluded folder or lies beneath one
    #[must_use]
    pub fn excludes(&self, path: &Path) -> bool {
        let candidate = with_trailing_slash(path);
        self.0.iter().any(|prefix| candidate.starts_with(prefix))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for ExclusionSet {
    fn from(folders: Vec<String>) -> Self {
        Self::new(folders)
    }
}

impl From<ExclusionSet> for Vec<String> {
    fn from(set: ExclusionSet) -> Self {
        set.0.into_iter().collect()
    }
}
