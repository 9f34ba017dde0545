//! InvBridge Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `LedgerEntry`, `Page`, `RawRecord`, `TransformedDocument`, `RunSummary`
//! - **Record transformation** - `InvoiceTransformer` (fireTMS invoice to Optima invoice)
//! - **Port definitions** - Traits for adapters: `ISourceSystem`, `IDestinationSystem`,
//!   `IStateStore`, `IRecordTransformer`
//! - **Configuration** - Typed YAML + environment configuration with validation
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`invbridge-state`, `invbridge-http`), and the orchestration in
//! `invbridge-sync` depends only on those traits.

pub mod config;
pub mod domain;
pub mod ports;
pub mod transform;
