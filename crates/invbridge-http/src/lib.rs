//! InvBridge HTTP - fireTMS and Optima adapters
//!
//! This crate provides the HTTP-backed implementations of the network
//! ports defined in `invbridge-core`:
//!
//! - [`source::SourceClient`] implements `ISourceSystem` (paged fireTMS reads)
//! - [`destination::DestinationClient`] implements `IDestinationSystem`
//!   (Optima upserts)
//!
//! Both share [`client::ApiClient`] for bearer auth and JSON handling and
//! [`retry::RetryPolicy`] for exponential backoff on transient failures.

use reqwest::StatusCode;

pub mod client;
pub mod destination;
pub mod retry;
pub mod source;

pub use client::ApiClient;
pub use destination::DestinationClient;
pub use retry::{RetryError, RetryPolicy, Retryable};
pub use source::SourceClient;

/// Statuses that warrant backoff-and-retry rather than immediate failure
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Errors raised by a single HTTP exchange
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The request never produced a response (timeout, connection, TLS...)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A 2xx response whose body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Whether a later attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Status { status, .. } => RETRYABLE_STATUSES.contains(&status.as_u16()),
            ClientError::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            ClientError::InvalidResponse(_) => false,
        }
    }
}

impl Retryable for ClientError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}
