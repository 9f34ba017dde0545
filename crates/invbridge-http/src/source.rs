//! fireTMS reader (`ISourceSystem` adapter)
//!
//! `GET {base}/invoices?updatedFrom={cursor}&page={n}&pageSize={m}`
//! returns `{ "items": [...], "nextPage": bool }`.

use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use invbridge_core::config::Config;
use invbridge_core::domain::{Cursor, Page, RawRecord, SyncError};
use invbridge_core::ports::ISourceSystem;

use crate::client::ApiClient;
use crate::retry::RetryPolicy;
use crate::ClientError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    #[serde(default)]
    next_page: bool,
}

/// Paged, retrying reader of fireTMS invoices
pub struct SourceClient {
    api: ApiClient,
    retry: RetryPolicy,
}

impl SourceClient {
    pub fn new(api: ApiClient, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Client for `config.source` with the configured timeout and retry policy
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let api = ApiClient::new(
            config.source.base_url.as_str(),
            config.source.token.as_str(),
            config.http.request_timeout(),
        )?;
        Ok(Self::new(api, RetryPolicy::from_config(config)))
    }
}

#[async_trait::async_trait]
impl ISourceSystem for SourceClient {
    async fn fetch_page(
        &self,
        since: &Cursor,
        page: u32,
        page_size: u32,
    ) -> Result<Page, SyncError> {
        let page_str = page.to_string();
        let size_str = page_size.to_string();

        let response: PageResponse = self
            .retry
            .run("fetch_page", || {
                let request = self.api.request(Method::GET, "/invoices").query(&[
                    ("updatedFrom", since.as_str()),
                    ("page", page_str.as_str()),
                    ("pageSize", size_str.as_str()),
                ]);
                self.api.send_json(request)
            })
            .await
            .map_err(|e| SyncError::SourceUnavailable(format!("page {page}: {e}")))?;

        debug!(
            page,
            items = response.items.len(),
            next_page = response.next_page,
            "Fetched source page"
        );

        Ok(Page::new(
            response.items.into_iter().map(RawRecord::new).collect(),
            response.next_page,
        ))
    }
}
