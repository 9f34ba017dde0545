//! InvBridge Daemon - Background synchronization service
//!
//! This binary runs as a long-lived service and handles:
//! - Periodic fireTMS → Optima synchronization runs
//! - The optional HTTP trigger, status and metrics endpoints
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Configuration is read once (`INVBRIDGE_CONFIG`, `.env` and environment
//! overrides apply). The `SyncRunner` loop and the trigger server share one
//! `CancellationToken` that is triggered on receipt of SIGTERM or SIGINT.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use invbridge_core::config::{Config, LoggingConfig};
use invbridge_core::domain::Cursor;
use invbridge_core::transform::InvoiceTransformer;
use invbridge_daemon::{SyncMetrics, TriggerContext, TriggerServer};
use invbridge_http::{DestinationClient, SourceClient};
use invbridge_state::{DatabasePool, SqliteStateStore};
use invbridge_sync::{EngineSettings, SyncEngine, SyncRunner};

/// Log files are named `invbridged.<date>.log`
const LOG_FILE_PREFIX: &str = "invbridged";
const LOG_FILE_SUFFIX: &str = "log";
/// Rotated files kept in `logging.dir`
const MAX_LOG_FILES: usize = 14;

// ============================================================================
// Logging
// ============================================================================

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer<W>(json: bool, ansi: bool, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);
    if json {
        layer.json().with_current_span(true).boxed()
    } else {
        layer.boxed()
    }
}

/// Daily-rotated appender writing `invbridged.<date>.log` under `dir`
fn file_appender(dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))
}

/// Installs the global subscriber; `RUST_LOG` wins over the configured level
///
/// Logs go to stderr and, when `logging.dir` is set, to a rotating file. The
/// returned guard flushes the file writer and must live until exit.
fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let json = logging.format == "json";

    let mut layers = vec![fmt_layer(json, true, std::io::stderr)];
    let guard = match &logging.dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(dir)?);
            layers.push(fmt_layer(json, false, writer));
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(guard)
}

// ============================================================================
// Wiring
// ============================================================================

/// Opens the state database and assembles the runner, reporting to `metrics`
async fn build_runner(
    config: &Config,
    metrics: Arc<SyncMetrics>,
) -> Result<(DatabasePool, Arc<SyncRunner>)> {
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
    let state = Arc::new(SqliteStateStore::new(pool.pool().clone(), initial_cursor));

    let source = SourceClient::from_config(config).context("Failed to create fireTMS client")?;
    let destination =
        DestinationClient::from_config(config).context("Failed to create Optima client")?;

    let engine = SyncEngine::new(
        Arc::new(source),
        Arc::new(destination),
        Arc::new(InvoiceTransformer::new()),
        state,
        EngineSettings::from_config(config),
    );

    let runner = SyncRunner::new(Arc::new(engine), config.sync.poll_interval())
        .with_observer(metrics);
    Ok((pool, Arc::new(runner)))
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
///
/// A handler that cannot be installed is logged and never fires; the other
/// one still works.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_path) = Config::load_effective(None)?;
    let _log_guard = init_tracing(&config.logging)?;
    config.ensure_valid()?;

    info!(
        config_path = %config_path.display(),
        log_dir = ?config.logging.dir,
        source = %config.source.base_url,
        destination = %config.destination.base_url,
        "InvBridge daemon starting (invbridged)"
    );

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let metrics = Arc::new(SyncMetrics::new()?);
    let (pool, runner) = build_runner(&config, Arc::clone(&metrics)).await?;

    let server = if config.trigger.enabled {
        let ctx = TriggerContext::new(&runner, Arc::clone(&metrics));
        let server = TriggerServer::bind(&config.trigger.listen_addr, ctx)
            .await
            .with_context(|| {
                format!(
                    "Failed to bind trigger server on {}",
                    config.trigger.listen_addr
                )
            })?;
        Some(tokio::spawn(server.run(shutdown_token.clone())))
    } else {
        None
    };

    runner.run_forever(shutdown_token.clone()).await;

    // The loop only returns once shutdown was requested
    shutdown_token.cancel();
    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Trigger server stopped with error"),
            Err(e) => warn!(error = %e, "Trigger server task failed"),
        }
    }
    pool.close().await;

    info!("InvBridge daemon shut down gracefully");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
