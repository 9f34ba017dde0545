//! CLI command implementations
//!
//! Each submodule defines a clap `Args`/`Subcommand` type with an
//! `execute()` method. Shared adapter wiring lives here.

pub mod config;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use invbridge_core::config::Config;
use invbridge_core::domain::Cursor;
use invbridge_core::transform::InvoiceTransformer;
use invbridge_http::{DestinationClient, SourceClient};
use invbridge_state::{DatabasePool, SqliteStateStore};
use invbridge_sync::{EngineSettings, SyncEngine};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global flags every command sees
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub format: OutputFormat,
    pub quiet: bool,
    /// `--config` override
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        self.format.is_json()
    }
}

/// Loads and validates the effective configuration
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let (config, path) = Config::load_effective(explicit)?;
    info!(config_path = %path.display(), "Loaded configuration");
    config.ensure_valid()?;
    Ok(config)
}

/// Opens the state database named by the configuration
pub async fn open_state(config: &Config) -> Result<(DatabasePool, Arc<SqliteStateStore>)> {
    let pool = DatabasePool::new(&config.state.db_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open state database {}",
                config.state.db_path.display()
            )
        })?;
    let initial_cursor =
        Cursor::new(config.sync.initial_cursor.as_str()).context("Invalid initial cursor")?;
    let store = Arc::new(SqliteStateStore::new(pool.pool().clone(), initial_cursor));
    Ok((pool, store))
}

/// Wires the fireTMS and Optima clients, the transformer and `state` into an engine
pub fn build_engine(config: &Config, state: Arc<SqliteStateStore>) -> Result<SyncEngine> {
    let source = SourceClient::from_config(config).context("Failed to create fireTMS client")?;
    let destination =
        DestinationClient::from_config(config).context("Failed to create Optima client")?;

    Ok(SyncEngine::new(
        Arc::new(source),
        Arc::new(destination),
        Arc::new(InvoiceTransformer::new()),
        state,
        EngineSettings::from_config(config),
    ))
}
