//! Status command - show persisted sync progress
//!
//! Reads the cursor and the ledger counts from the state database without
//! contacting either remote system.

use anyhow::{Context, Result};
use clap::Args;

use invbridge_core::domain::LedgerStatus;
use invbridge_core::ports::IStateStore;

use super::{load_config, open_state, CommandContext};
use crate::output::plural;

/// Show the cursor and ledger counts
#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = load_config(ctx.config_path.as_deref())?;
        let db_path = &config.state.db_path;

        if !db_path.exists() {
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "initialized": false,
                    "db_path": db_path.display().to_string(),
                    "cursor": config.sync.initial_cursor,
                }));
            } else {
                formatter.success("No sync has run yet");
                formatter.info(&format!("Database:  {}", db_path.display()));
                formatter.info(&format!(
                    "First run will fetch invoices updated since {}",
                    config.sync.initial_cursor
                ));
            }
            return Ok(());
        }

        let (pool, store) = open_state(&config).await?;
        let cursor = store.get_cursor().await.context("Failed to read cursor")?;
        let counts = store
            .count_ledger_by_status()
            .await
            .context("Failed to count ledger entries")?;
        pool.close().await;

        let count_of = |status: LedgerStatus| counts.get(status.as_str()).copied().unwrap_or(0);
        let total: u64 = counts.values().sum();

        if ctx.is_json() {
            let ledger: serde_json::Map<String, serde_json::Value> = LedgerStatus::ALL
                .iter()
                .map(|s| (s.as_str().to_string(), count_of(*s).into()))
                .collect();
            formatter.print_json(&serde_json::json!({
                "initialized": true,
                "db_path": db_path.display().to_string(),
                "cursor": cursor.as_str(),
                "ledger": ledger,
                "total": total,
            }));
            return Ok(());
        }

        formatter.success(&format!("{} in ledger", plural(total, "invoice")));
        formatter.info(&format!("Cursor:    {cursor}"));
        formatter.info(&format!("Database:  {}", db_path.display()));
        for status in LedgerStatus::ALL {
            formatter.info(&format!("{:<10} {}", format!("{status}:"), count_of(status)));
        }

        Ok(())
    }
}
