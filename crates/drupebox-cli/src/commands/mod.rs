//! CLI subcommands

pub mod auth;
pub mod config;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use drupebox_core::config::Config;
use tracing::info;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Settings shared by every subcommand, taken from the global flags
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config_path: PathBuf,
}

impl CommandContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Loads the config file, using defaults when it does not exist
    ///
    /// A file that exists but cannot be parsed is an error.
    pub fn load_config(&self) -> Result<Config> {
        if !self.config_path.exists() {
            info!(config_path = %self.config_path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }
        Config::load(&self.config_path).with_context(|| {
            format!(
                "Failed to load configuration from {}",
                self.config_path.display()
            )
        })
    }
}
