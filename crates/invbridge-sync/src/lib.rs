//! InvBridge Sync - Incremental synchronization engine
//!
//! Provides:
//! - Cursor-based paginated crawl of the source system
//! - Per-record idempotent skip backed by the ledger
//! - Bounded-concurrency upserts within a page
//! - Continuous mode with poll interval, on-demand trigger and shutdown
//!
//! ## Modules
//!
//! - [`engine`] - One synchronization run (`SyncEngine::sync_once`)
//! - [`runner`] - Repeated runs (`SyncRunner::run_forever`)

pub mod engine;
pub mod runner;

pub use engine::{EngineSettings, SyncEngine};
pub use runner::{IRunObserver, RunReport, RunTrigger, SyncRunner};
