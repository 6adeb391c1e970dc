//! Status command - What the last run left behind
//!
//! Reads the run state and local snapshot from the state directory without
//! touching Dropbox.

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Args;
use drupebox_core::config::Config;
use drupebox_sync::local_tree::LocalTreeStore;
use drupebox_sync::run_state::{RunState, RunStateStore};
use serde_json::json;

use super::CommandContext;
use crate::output::OutputFormatter;

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let policy = config.policy().context("Invalid sync settings")?;
        let state_dir = config.state_dir();

        let run_state_store = RunStateStore::new(&state_dir);
        let previous = run_state_store
            .load()
            .await
            .context("Failed to read run state")?;
        let snapshot = LocalTreeStore::new(&state_dir)
            .previous_tree()
            .await
            .context("Failed to read local snapshot")?;

        let last_run = previous.last_run_at();
        let deletions_trusted = previous.is_recent(Utc::now(), policy.lookback_window);
        let exclusions_changed = previous.exclusion_set_changed(&policy.exclusions);

        if ctx.is_json() {
            formatter.print_json(&json!({
                "config_path": ctx.config_path.display().to_string(),
                "sync_root": policy.root.to_string(),
                "state_dir": state_dir.display().to_string(),
                "authorized": config.auth.refresh_token.is_some(),
                "last_run": last_run.map(|t| t.to_rfc3339()),
                "has_cursor": !previous.cursor.is_empty(),
                "excluded_folder_paths": previous.exclusions.iter().collect::<Vec<_>>(),
                "exclusions_changed": exclusions_changed,
                "snapshot_entries": snapshot.len(),
                "remote_deletions_trusted": deletions_trusted,
            }));
            return Ok(());
        }

        formatter.success(&format!("Sync root: {}", policy.root));
        print_authorization(&config, &*formatter);

        match last_run {
            Some(at) => {
                let age = Utc::now() - at;
                formatter.info(&format!(
                    "Last run:   {} ({} min ago)",
                    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                    age.num_minutes()
                ));
            }
            None => formatter.info("Last run:   never"),
        }
        formatter.info(&format!(
            "Cursor:     {}",
            if previous.cursor.is_empty() { "none" } else { "stored" }
        ));
        formatter.info(&format!("Snapshot:   {} entries", snapshot.len()));
        print_exclusions(&previous, &*formatter);

        if exclusions_changed && last_run.is_some() {
            formatter.warn("Excluded folders changed; the next run will not propagate local deletions");
        }
        if last_run.is_some() && !deletions_trusted {
            formatter.info("Last run is outside the look-back window; items deleted on Dropbox will be uploaded again");
        }

        Ok(())
    }
}

fn print_authorization(config: &Config, formatter: &dyn OutputFormatter) {
    if config.auth.refresh_token.is_some() {
        formatter.info("Authorized: yes");
    } else {
        formatter.info("Authorized: no (run 'drupebox auth login')");
    }
}

fn print_exclusions(previous: &RunState, formatter: &dyn OutputFormatter) {
    if previous.exclusions.is_empty() {
        formatter.info("Excluded:   none");
        return;
    }
    formatter.info("Excluded:");
    for folder in previous.exclusions.iter() {
        formatter.info(&format!("  - {folder}"));
    }
}
