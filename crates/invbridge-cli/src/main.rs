//! InvBridge CLI - Command-line interface for InvBridge
//!
//! Provides commands for:
//! - Running a single fireTMS → Optima synchronization pass
//! - Viewing the persisted cursor and ledger
//! - Inspecting and validating configuration

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{config::ConfigCommand, status::StatusCommand, sync::SyncCommand, CommandContext};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "invbridge",
    version,
    about = "Incremental fireTMS to Optima invoice synchronization"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one synchronization pass
    Sync(SyncCommand),
    /// Show the cursor and ledger counts
    Status(StatusCommand),
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }

    fn context(&self) -> CommandContext {
        CommandContext {
            format: OutputFormat::from_flag(self.json),
            quiet: self.quiet,
            config_path: self.config.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing; stdout is reserved for command output
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = cli.context();

    let result = match &cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ctx.formatter().error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
