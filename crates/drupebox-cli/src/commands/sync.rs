//! Sync command - One reconciliation pass against Dropbox
//!
//! Provides the `drupebox sync` CLI command which:
//! 1. Loads and validates configuration
//! 2. Trades the stored refresh token for an access token
//! 3. Creates the adapters (Dropbox, local filesystem)
//! 4. Runs the SyncEngine and displays the summary

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use drupebox_dropbox::auth::DropboxAuth;
use drupebox_dropbox::provider::DropboxStorage;
use drupebox_sync::engine::{SyncEngine, SyncResult};
use drupebox_sync::filesystem::LocalFileSystemAdapter;
use tracing::info;

use super::CommandContext;
use crate::output::{format_duration_ms, plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();

        // Step 1: Load and validate config
        let config = ctx.load_config()?;
        let problems = config.validate();
        if !problems.is_empty() {
            for problem in &problems {
                formatter.error(&problem.to_string());
            }
            if problems.iter().any(|p| p.field == "sync.root") {
                formatter.info("Run 'drupebox auth login --root <dir>' to set up the sync folder.");
            }
            anyhow::bail!(
                "Invalid configuration in {}",
                ctx.config_path.display()
            );
        }
        let policy = config.policy().context("Invalid sync settings")?;

        let refresh_token = config
            .auth
            .refresh_token
            .as_deref()
            .context("Not authorized yet. Run 'drupebox auth login' first.")?;

        info!(config_path = %ctx.config_path.display(), root = %policy.root, "Loaded configuration");

        // Step 2: Connect to Dropbox
        let auth = DropboxAuth::new(config.auth.app_key.clone())?;
        let remote = Arc::new(
            DropboxStorage::connect(&auth, refresh_token)
                .await
                .context("Failed to connect to Dropbox")?,
        );

        // Step 3: Local adapter
        let local_fs = Arc::new(match config.trash_dir() {
            Some(dir) => LocalFileSystemAdapter::with_trash_dir(dir),
            None => LocalFileSystemAdapter::new(),
        });

        // Step 4: Run
        formatter.info("Starting synchronization...");
        let engine = SyncEngine::new(remote, local_fs, policy, &config.state_dir());
        let result = engine.sync().await?;

        // Step 5: Display results
        if ctx.is_json() {
            let json = serde_json::to_value(&result).context("Failed to serialize sync result")?;
            formatter.print_json(&json);
        } else {
            print_summary(&result, &*formatter);
        }

        Ok(())
    }
}

fn print_summary(result: &SyncResult, formatter: &dyn OutputFormatter) {
    let duration = format_duration_ms(result.duration_ms);

    if result.is_noop() && result.errors.is_empty() {
        formatter.success(&format!("Already up to date ({duration})"));
    } else {
        formatter.success(&format!("Sync completed in {duration}"));
    }

    if result.files_downloaded > 0 {
        formatter.info(&format!(
            "Downloaded: {}",
            plural(result.files_downloaded as usize, "file")
        ));
    }
    if result.files_uploaded > 0 {
        formatter.info(&format!(
            "Uploaded:   {}",
            plural(result.files_uploaded as usize, "file")
        ));
    }
    if result.folders_created > 0 {
        formatter.info(&format!(
            "Created:    {}",
            plural(result.folders_created as usize, "folder")
        ));
    }
    if result.files_deleted > 0 {
        formatter.info(&format!(
            "Deleted:    {}",
            plural(result.files_deleted as usize, "item")
        ));
    }

    if result.local_deletions_skipped {
        formatter.warn(
            "Excluded folders changed since the last run; local deletions were not propagated",
        );
    }
    for path in &result.skipped_too_large {
        formatter.warn(&format!("Not uploaded, too large: {path}"));
    }

    if !result.errors.is_empty() {
        formatter.error(&format!("{} occurred:", plural(result.errors.len(), "error")));
        for err in &result.errors {
            formatter.info(&format!("  - {}", err));
        }
    }
}
