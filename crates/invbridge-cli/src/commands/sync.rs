//! Sync command - one incremental fireTMS → Optima pass
//!
//! Provides the `invbridge sync` CLI command which:
//! 1. Loads and validates the configuration
//! 2. Opens the state database
//! 3. Wires the HTTP adapters into a `SyncEngine`
//! 4. Runs a single pass (Ctrl+C cancels it) and prints the summary

use anyhow::{anyhow, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use invbridge_core::domain::{RunSummary, SyncError};

use super::{build_engine, load_config, open_state, CommandContext};
use crate::output::{format_duration_ms, plural, OutputFormatter};

/// Run a single synchronization pass
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Override the number of records processed concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Abort the run after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();

        let mut config = load_config(ctx.config_path.as_deref())?;
        if let Some(concurrency) = self.concurrency {
            config.sync.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.sync.run_timeout_secs = Some(timeout);
        }
        config.ensure_valid()?;

        let (pool, state) = open_state(&config).await?;
        let engine = build_engine(&config, state)?;

        formatter.info(&format!(
            "Syncing {} → {}",
            config.source.base_url, config.destination.base_url
        ));

        let cancel = CancellationToken::new();
        let ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received SIGINT (Ctrl+C), cancelling run");
                    cancel.cancel();
                }
            })
        };

        let result = engine.sync_until_cancelled(&cancel).await;
        ctrl_c.abort();
        pool.close().await;

        match result {
            Ok(summary) => {
                report(&summary, ctx.is_json(), formatter.as_ref());
                Ok(())
            }
            Err(SyncError::Cancelled) => Err(anyhow!("Sync cancelled, cursor unchanged")),
            Err(err) => Err(anyhow!(err).context("Sync run aborted, cursor unchanged")),
        }
    }
}

/// Prints a completed run
fn report(summary: &RunSummary, json: bool, formatter: &dyn OutputFormatter) {
    if json {
        formatter.print_json(&serde_json::to_value(summary).unwrap_or_default());
        return;
    }

    let duration = format_duration_ms(summary.duration_ms);
    if summary.is_up_to_date() {
        formatter.success(&format!("Already up to date ({duration})"));
    } else {
        formatter.success(&format!("Sync completed in {duration}"));
    }

    formatter.info(&format!(
        "Processed: {} in {}",
        plural(summary.processed, "record"),
        plural(u64::from(summary.pages), "page")
    ));
    formatter.info(&format!("Synced:    {}", summary.synced));
    formatter.info(&format!("Skipped:   {}", summary.skipped));
    formatter.info(&format!("Failed:    {}", summary.failed));
    if let Some(cursor) = &summary.cursor_after {
        formatter.info(&format!("Cursor:    {} → {}", summary.cursor_before, cursor));
    }

    if summary.failed > 0 {
        formatter.warn(&format!(
            "{} could not be synced:",
            plural(summary.failed, "record")
        ));
        for error in &summary.errors {
            formatter.info(&format!("  {error}"));
        }
        let hidden = summary.failed.saturating_sub(summary.errors.len() as u64);
        if hidden > 0 {
            formatter.info(&format!("  ... and {hidden} more"));
        }
    }
}
