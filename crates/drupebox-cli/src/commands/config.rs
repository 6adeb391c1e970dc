//! Config command - View and validate Drupebox configuration
//!
//! Provides the `drupebox config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Prints the path of the configuration file in use
//! 3. Validates the configuration file and reports errors

use anyhow::{Context, Result};
use clap::Subcommand;
use drupebox_core::config::Config;
use tracing::info;

use super::CommandContext;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Path => self.execute_path(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
        }
    }

    fn execute_show(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = redacted(ctx.load_config()?);

        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    fn execute_path(&self, ctx: &CommandContext) -> Result<()> {
        if ctx.is_json() {
            ctx.formatter().print_json(&serde_json::json!({
                "config_path": ctx.config_path.display().to_string(),
                "exists": ctx.config_path.exists(),
            }));
        } else {
            println!("{}", ctx.config_path.display());
        }
        Ok(())
    }

    fn execute_validate(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();

        // Unlike the other commands, a missing file is reported
        let config = match Config::load(&ctx.config_path) {
            Ok(config) => config,
            Err(e) => {
                let message = format!(
                    "Failed to load {}: {e:#}",
                    ctx.config_path.display()
                );
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({"valid": false, "errors": [message]}));
                } else {
                    formatter.error(&message);
                }
                anyhow::bail!("Configuration is not valid");
            }
        };

        let problems = config.validate();
        if ctx.is_json() {
            let errors: Vec<String> = problems.iter().map(ToString::to_string).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "errors": errors,
            }));
        } else if problems.is_empty() {
            formatter.success(&format!("{} is valid", ctx.config_path.display()));
        } else {
            for problem in &problems {
                formatter.error(&problem.to_string());
            }
        }

        if !problems.is_empty() {
            anyhow::bail!("Configuration is not valid");
        }
        Ok(())
    }
}

/// Hides the refresh token for display
fn redacted(mut config: Config) -> Config {
    if config.auth.refresh_token.is_some() {
        config.auth.refresh_token = Some("<redacted>".to_string());
    }
    config
}
