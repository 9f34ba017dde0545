//! Record transformers
//!
//! Implementations of [`IRecordTransformer`](crate::ports::IRecordTransformer).
//! Currently only the fireTMS → Optima invoice mapping exists.

pub mod invoice;

pub use invoice::{map_vat_rate, InvoiceTransformer};
