//! Configuration module for Drupebox.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::paths::{ExclusionSet, SyncRoot};
use crate::domain::policy::{IgnoreRules, SyncPolicy, DEFAULT_MAX_FILE_SIZE};

/// Public Dropbox app key used when the config does not name one.
pub const DEFAULT_APP_KEY: &str = "1skff241na3x0at";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Drupebox.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub ignore: IgnoreRules,
    pub state: StateConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root directory for the local Dropbox mirror.
    pub root: PathBuf,
    /// Local folders that are never synced, in either direction.
    pub excluded_folder_paths: Vec<PathBuf>,
    /// Files of this many bytes or more are never uploaded.
    pub max_file_size: u64,
    /// Allow trashing local items that were deleted on the remote.
    pub really_delete_local_files: bool,
    /// Seconds a previous run stays trustworthy for deletion decisions.
    pub lookback_window_secs: u64,
    /// Seconds before the cached remote listing is fetched again.
    pub remote_staleness_secs: u64,
    /// Move trashed items here instead of the desktop trash.
    pub trash_dir: Option<PathBuf>,
}

/// Where run state and the last local snapshot are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub dir: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Dropbox app credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Dropbox app key (PKCE app, no secret).
    pub app_key: String,
    /// Long-lived refresh token. `None` until the app has been authorized.
    pub refresh_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write this configuration as YAML to `path`, creating parent folders.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drupebox/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drupebox")
            .join("config.yaml")
    }

    /// Build the per-run [`SyncPolicy`] from this configuration.
    ///
    /// Expands a leading `~` in the root and the excluded folders.
    pub fn policy(&self) -> Result<SyncPolicy, DomainError> {
        let root = SyncRoot::new(expand_tilde(&self.sync.root))?;
        let exclusions = ExclusionSet::new(
            self.sync
                .excluded_folder_paths
                .iter()
                .map(|p| expand_tilde(p)),
        );

        Ok(SyncPolicy {
            root,
            exclusions,
            ignore: self.ignore.clone(),
            max_file_size: self.sync.max_file_size,
            really_delete_local_files: self.sync.really_delete_local_files,
            lookback_window: Duration::from_secs(self.sync.lookback_window_secs),
            remote_staleness: Duration::from_secs(self.sync.remote_staleness_secs),
        })
    }

    /// Create the sync root (and its parents) if it does not exist yet.
    ///
    /// Returns the root with `~` expanded.
    pub fn ensure_sync_root(&self) -> anyhow::Result<PathBuf> {
        let root = expand_tilde(&self.sync.root);
        if !root.is_absolute() {
            anyhow::bail!("sync.root must be an absolute path: {}", self.sync.root.display());
        }
        if !root.is_dir() {
            std::fs::create_dir_all(&root)?;
            tracing::info!(root = %root.display(), "Created sync root");
        }
        Ok(root)
    }

    /// State directory with `~` expanded.
    pub fn state_dir(&self) -> PathBuf {
        expand_tilde(&self.state.dir)
    }

    /// Trash directory with `~` expanded, if configured.
    pub fn trash_dir(&self) -> Option<PathBuf> {
        self.sync.trash_dir.as_deref().map(expand_tilde)
    }
}

/// Replace a leading `~` with the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Dropbox"),
            excluded_folder_paths: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            really_delete_local_files: false,
            lookback_window_secs: 2 * 60 * 60,
            remote_staleness_secs: 60,
            trash_dir: None,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        // Memory-backed when available; the state is disposable.
        let shm = Path::new("/dev/shm");
        let dir = if shm.is_dir() {
            shm.to_path_buf()
        } else {
            std::env::temp_dir()
        };
        Self { dir }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            app_key: DEFAULT_APP_KEY.to_string(),
            refresh_token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.max_file_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        let root = expand_tilde(&self.sync.root);
        if !root.is_absolute() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: format!("must be an absolute path: {}", self.sync.root.display()),
            });
        } else if !root.exists() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: format!("directory does not exist: {}", root.display()),
            });
        }

        for excluded in &self.sync.excluded_folder_paths {
            let expanded = expand_tilde(excluded);
            if !expanded.is_absolute() {
                errors.push(ValidationError {
                    field: "sync.excluded_folder_paths".into(),
                    message: format!("must be an absolute path: {}", excluded.display()),
                });
            } else if !expanded.starts_with(&root) {
                errors.push(ValidationError {
                    field: "sync.excluded_folder_paths".into(),
                    message: format!("not inside sync.root: {}", excluded.display()),
                });
            }
        }

        if self.sync.max_file_size == 0 {
            errors.push(ValidationError {
                field: "sync.max_file_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.lookback_window_secs == 0 {
            errors.push(ValidationError {
                field: "sync.lookback_window_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.remote_staleness_secs == 0 {
            errors.push(ValidationError {
                field: "sync.remote_staleness_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if let Some(trash_dir) = &self.sync.trash_dir {
            if expand_tilde(trash_dir).starts_with(&root) {
                errors.push(ValidationError {
                    field: "sync.trash_dir".into(),
                    message: "must not be inside sync.root".into(),
                });
            }
        }

        // --- ignore ---
        if self
            .ignore
            .prefixes
            .iter()
            .chain(&self.ignore.suffixes)
            .chain(&self.ignore.names)
            .any(String::is_empty)
        {
            errors.push(ValidationError {
                field: "ignore".into(),
                message: "patterns must not be empty (an empty pattern matches every name)"
                    .into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- auth ---
        if self.auth.app_key.trim().is_empty() {
            errors.push(ValidationError {
                field: "auth.app_key".into(),
                message: "must not be empty".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use drupebox_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/home/user/Dropbox"))
///     .sync_max_file_size(50_000_000)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn sync_excluded_folder(mut self, folder: PathBuf) -> Self {
        self.config.sync.excluded_folder_paths.push(folder);
        self
    }

    pub fn sync_max_file_size(mut self, bytes: u64) -> Self {
        self.config.sync.max_file_size = bytes;
        self
    }

    pub fn sync_really_delete_local_files(mut self, enabled: bool) -> Self {
        self.config.sync.really_delete_local_files = enabled;
        self
    }

    pub fn sync_lookback_window_secs(mut self, seconds: u64) -> Self {
        self.config.sync.lookback_window_secs = seconds;
        self
    }

    pub fn sync_remote_staleness_secs(mut self, seconds: u64) -> Self {
        self.config.sync.remote_staleness_secs = seconds;
        self
    }

    pub fn sync_trash_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.trash_dir = Some(dir);
        self
    }

    // --- ignore ---

    pub fn ignore_rules(mut self, rules: IgnoreRules) -> Self {
        self.config.ignore = rules;
        self
    }

    // --- state ---

    pub fn state_dir(mut self, dir: PathBuf) -> Self {
        self.config.state.dir = dir;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- auth ---

    pub fn auth_app_key(mut self, app_key: impl Into<String>) -> Self {
        self.config.auth.app_key = app_key.into();
        self
    }

    pub fn auth_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth.refresh_token = Some(token.into());
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
