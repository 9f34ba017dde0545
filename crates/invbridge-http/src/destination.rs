//! Optima writer (`IDestinationSystem` adapter)
//!
//! `POST {base}/invoices/upsert` with the mapped document as the JSON body.
//! Optima merges on `docNo`, so repeating a write is harmless. The response
//! carries the Optima identifier as `externalId`.

use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use invbridge_core::config::Config;
use invbridge_core::domain::{DestinationId, SyncError, TransformedDocument};
use invbridge_core::ports::IDestinationSystem;

use crate::client::ApiClient;
use crate::retry::RetryPolicy;
use crate::ClientError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    external_id: Option<String>,
}

/// Retrying, idempotent Optima upserts
pub struct DestinationClient {
    api: ApiClient,
    retry: RetryPolicy,
}

impl DestinationClient {
    pub fn new(api: ApiClient, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Client for `config.destination` with the configured timeout and retry policy
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let api = ApiClient::new(
            config.destination.base_url.as_str(),
            config.destination.token.as_str(),
            config.http.request_timeout(),
        )?;
        Ok(Self::new(api, RetryPolicy::from_config(config)))
    }

    async fn upsert_once(&self, document: &TransformedDocument) -> Result<String, ClientError> {
        let request = self
            .api
            .request(Method::POST, "/invoices/upsert")
            .json(&document.body);
        let response: UpsertResponse = self.api.send_json(request).await?;

        match response.external_id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(ClientError::InvalidResponse(
                "response has no externalId".to_string(),
            )),
        }
    }
}

#[async_trait::async_trait]
impl IDestinationSystem for DestinationClient {
    async fn upsert(&self, document: &TransformedDocument) -> Result<DestinationId, SyncError> {
        let source_id = &document.source_id;

        let external_id = self
            .retry
            .run("upsert", || self.upsert_once(document))
            .await
            .map_err(|e| SyncError::DestinationUnavailable(format!("invoice {source_id}: {e}")))?;

        debug!(record_id = %source_id, external_id = %external_id, "Upserted document");

        DestinationId::new(external_id).map_err(|e| {
            SyncError::DestinationUnavailable(format!("invoice {source_id}: {e}"))
        })
    }
}
