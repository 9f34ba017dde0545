//! Authenticated JSON client shared by the adapters
//!
//! Wraps `reqwest::Client` with a base URL, a bearer token and a per-request
//! timeout. Each call is a single attempt; retrying is the caller's job.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use invbridge_http::client::ApiClient;
//! use reqwest::Method;
//!
//! # async fn example() -> Result<(), invbridge_http::ClientError> {
//! let client = ApiClient::new("http://localhost:8000/firetms", "token", Duration::from_secs(30))?;
//! let body: serde_json::Value = client.send_json(client.request(Method::GET, "/invoices")).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::ClientError;

/// Largest error body kept in `ClientError::Status`
const MAX_ERROR_BODY: usize = 512;

/// HTTP client bound to one API base URL
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Creates a client for `base_url` (a trailing slash is ignored)
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the TLS backend cannot be initialised.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, token))
    }

    /// Creates a client around an existing `reqwest::Client`
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token: token.into(),
        }
    }

    /// Creates an authenticated request builder for `path` under the base URL
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - Path relative to the base URL, starting with `/`
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url).bearer_auth(&self.token)
    }

    /// Sends `request` and decodes a 2xx JSON body
    ///
    /// # Errors
    ///
    /// - `ClientError::Network` when no response arrives
    /// - `ClientError::Status` for non-2xx responses (body truncated)
    /// - `ClientError::InvalidResponse` when the body is not the expected JSON
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(ClientError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        trace!(status = status.as_u16(), len = bytes.len(), "Received response");

        serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}
