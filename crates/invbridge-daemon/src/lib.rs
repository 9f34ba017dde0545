//! InvBridge Daemon - continuous synchronization service support
//!
//! The `invbridged` binary runs [`invbridge_sync::SyncRunner::run_forever`]
//! and, when enabled, the HTTP trigger server from this crate:
//!
//! - [`metrics::SyncMetrics`] - Prometheus counters, observing every run report
//! - [`server::TriggerServer`] - `POST /run-sync`, `GET /status`, `GET /metrics`

pub mod metrics;
pub mod server;

pub use metrics::SyncMetrics;
pub use server::{TriggerContext, TriggerServer};
