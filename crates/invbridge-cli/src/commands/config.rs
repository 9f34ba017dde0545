//! Config command - inspect the effective configuration
//!
//! Provides the `invbridge config` CLI command which:
//! 1. Shows the effective configuration (file + environment), tokens masked
//! 2. Validates it and reports every problem found
//! 3. Prints which configuration file is consulted

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use invbridge_core::config::{Config, CONFIG_PATH_ENV};

use super::CommandContext;

const MASK: &str = "********";

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the effective configuration
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx),
            ConfigCommand::Validate => execute_validate(ctx),
            ConfigCommand::Path => execute_path(ctx),
        }
    }
}

fn execute_show(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();
    let (config, path) = Config::load_effective(ctx.config_path.as_deref())?;
    let config = masked(config);

    info!(config_path = %path.display(), "Showing configuration");

    if ctx.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", path.display()));
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_validate(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();
    let (config, path) = Config::load_effective(ctx.config_path.as_deref())?;

    info!(config_path = %path.display(), "Validating configuration");

    let errors = config.validate();

    if ctx.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", path.display()));
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("invalid configuration")
    }
}

fn execute_path(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();
    let (path, source) = resolve_path(ctx.config_path.clone());
    let exists = path.exists();

    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "config_path": path.display().to_string(),
            "source": source,
            "exists": exists,
        }));
    } else {
        formatter.success(&path.display().to_string());
        formatter.info(&format!("From: {source}"));
        if !exists {
            formatter.info("File does not exist; defaults and environment apply");
        }
    }

    Ok(())
}

/// The file `Config::load_effective` would read, and what selected it
fn resolve_path(explicit: Option<PathBuf>) -> (PathBuf, &'static str) {
    if let Some(path) = explicit {
        return (path, "--config");
    }
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => (PathBuf::from(path), CONFIG_PATH_ENV),
        None => (Config::default_path(), "default"),
    }
}

/// Copy of `config` safe to print
fn masked(mut config: Config) -> Config {
    for token in [&mut config.source.token, &mut config.destination.token] {
        if !token.is_empty() {
            *token = MASK.to_string();
        }
    }
    config
}
