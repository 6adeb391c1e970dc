//! Auth commands - Login, Logout, and Status for Dropbox authorization
//!
//! Provides the `drupebox auth` CLI subcommands which:
//! 1. `login`  - Runs the no-redirect OAuth2 PKCE flow: prints the
//!    authorization URL, reads the code the user pastes, and stores the
//!    resulting refresh token in the config file. The sync root (`--root`,
//!    else the configured one) is created if missing and saved alongside.
//! 2. `logout` - Removes the refresh token from the config file.
//! 3. `status` - Shows whether a refresh token is stored and, with
//!    `--check`, whether Dropbox still accepts it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use drupebox_core::config::Config;
use drupebox_dropbox::auth::DropboxAuth;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use super::CommandContext;
use crate::output::OutputFormatter;

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authorize Drupebox with Dropbox
    Login {
        /// Custom Dropbox app key
        #[arg(long)]
        app_key: Option<String>,
        /// Local folder to sync (default: sync.root from the config, ~/Dropbox)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Remove the stored refresh token
    Logout,
    /// Check authorization status
    Status {
        /// Ask Dropbox for an access token to verify the refresh token
        #[arg(long)]
        check: bool,
    },
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let fmt = ctx.formatter();
        match self {
            AuthCommand::Login { app_key, root } => {
                self.execute_login(ctx, app_key.as_deref(), root.as_deref(), &*fmt)
                    .await
            }
            AuthCommand::Logout => self.execute_logout(ctx, &*fmt).await,
            AuthCommand::Status { check } => self.execute_status(ctx, *check, &*fmt).await,
        }
    }

    async fn execute_login(
        &self,
        ctx: &CommandContext,
        cli_app_key: Option<&str>,
        cli_root: Option<&Path>,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let mut config = prepare_login_config(ctx.load_config()?, cli_app_key, cli_root)?;

        info!(app_key = %config.auth.app_key, "Starting OAuth2 authorization");

        let auth = DropboxAuth::new(config.auth.app_key.clone())?;
        let request = auth.authorize_url();

        // The prompt is needed even with --json or --quiet
        eprintln!("1. Go to: {}", request.url);
        eprintln!("2. Click \"Allow\" (you might have to log in first).");
        eprintln!("3. Copy the authorization code.");
        eprint!("Enter the authorization code here: ");

        let mut code = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut code)
            .await
            .context("Failed to read authorization code")?;
        if code.trim().is_empty() {
            anyhow::bail!("No authorization code entered");
        }

        let tokens = auth
            .exchange_code(&code, request.verifier)
            .await
            .context("OAuth2 authorization failed")?;

        config.auth.refresh_token = tokens.refresh_token;
        config
            .save(&ctx.config_path)
            .with_context(|| format!("Failed to write {}", ctx.config_path.display()))?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "success": true,
                "config_path": ctx.config_path.display().to_string(),
                "sync_root": config.sync.root.display().to_string(),
            }));
        } else {
            fmt.success("Authorized with Dropbox");
            fmt.info(&format!("Syncing {}", config.sync.root.display()));
            fmt.info(&format!("Refresh token saved to {}", ctx.config_path.display()));
        }
        Ok(())
    }

    async fn execute_logout(&self, ctx: &CommandContext, fmt: &dyn OutputFormatter) -> Result<()> {
        let mut config = ctx.load_config()?;

        if config.auth.refresh_token.take().is_none() {
            fmt.success("Not authorized, nothing to remove");
            return Ok(());
        }

        config
            .save(&ctx.config_path)
            .with_context(|| format!("Failed to write {}", ctx.config_path.display()))?;

        info!(config_path = %ctx.config_path.display(), "Removed refresh token");
        fmt.success("Refresh token removed");
        Ok(())
    }

    async fn execute_status(
        &self,
        ctx: &CommandContext,
        check: bool,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let config = ctx.load_config()?;

        let Some(refresh_token) = config.auth.refresh_token.as_deref() else {
            if ctx.is_json() {
                fmt.print_json(&serde_json::json!({"authorized": false}));
            } else {
                fmt.warn("Not authorized. Run 'drupebox auth login'.");
            }
            return Ok(());
        };

        let valid = if check {
            let auth = DropboxAuth::new(config.auth.app_key.clone())?;
            match auth.refresh(refresh_token).await {
                Ok(_) => Some(true),
                Err(e) => {
                    info!(error = %format!("{e:#}"), "Refresh token rejected");
                    Some(false)
                }
            }
        } else {
            None
        };

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "authorized": true,
                "app_key": config.auth.app_key,
                "token_valid": valid,
            }));
            return Ok(());
        }

        fmt.success(&format!("Authorized (app key {})", config.auth.app_key));
        match valid {
            Some(true) => fmt.info("Dropbox accepted the refresh token"),
            Some(false) => fmt.error("Dropbox rejected the refresh token; run 'drupebox auth login'"),
            None => {}
        }
        Ok(())
    }
}

/// Applies the login overrides and creates the sync root if it is missing
fn prepare_login_config(
    mut config: Config,
    app_key: Option<&str>,
    root: Option<&Path>,
) -> Result<Config> {
    if let Some(app_key) = app_key {
        config.auth.app_key = app_key.to_string();
    }
    if let Some(root) = root {
        config.sync.root = root.to_path_buf();
    }
    config.sync.root = config
        .ensure_sync_root()
        .context("Failed to create the sync root")?;
    Ok(config)
}
