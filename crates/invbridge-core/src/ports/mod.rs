//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ISourceSystem`] - Paginated read of records updated since a cursor
//! - [`IDestinationSystem`] - Idempotent upsert of transformed documents
//! - [`IStateStore`] - Durable cursor and per-record ledger
//! - [`IRecordTransformer`] - Pure mapping from source record to destination document

pub mod destination_system;
pub mod record_transformer;
pub mod source_system;
pub mod state_store;

pub use destination_system::IDestinationSystem;
pub use record_transformer::IRecordTransformer;
pub use source_system::ISourceSystem;
pub use state_store::IStateStore;
