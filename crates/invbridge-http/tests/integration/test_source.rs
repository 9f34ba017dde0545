//! SourceClient against a mocked fireTMS
//!
//! - Query parameters and bearer auth
//! - `nextPage` handling and missing fields
//! - Retry on 429/5xx, no retry on other 4xx or bad JSON

use std::time::Duration;

use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use invbridge_core::config::ConfigBuilder;
use invbridge_core::domain::{Cursor, SyncError};
use invbridge_core::ports::ISourceSystem;
use invbridge_http::{ApiClient, RetryPolicy, SourceClient};

use crate::common;

fn cursor() -> Cursor {
    Cursor::new("2025-01-01T00:00:00Z").unwrap()
}

#[tokio::test]
async fn test_fetch_page_sends_cursor_and_paging() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .and(query_param("updatedFrom", "2025-01-01T00:00:00Z"))
        .and(query_param("page", "2"))
        .and(query_param("pageSize", "50"))
        .and(bearer_token(common::SOURCE_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [common::invoice("FTMS-1"), common::invoice("FTMS-2")],
            "nextPage": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::source_client(&server, 3);
    let page = client.fetch_page(&cursor(), 2, 50).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert!(page.has_more);
    assert_eq!(page.items[0].id().unwrap().as_str(), "FTMS-1");
}

#[tokio::test]
async fn test_missing_fields_mean_empty_last_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let page = common::source_client(&server, 3)
        .fetch_page(&cursor(), 1, 50)
        .await
        .unwrap();

    assert!(page.is_empty());
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [common::invoice("FTMS-1")],
            "nextPage": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = common::source_client(&server, 5)
        .fetch_page(&cursor(), 1, 50)
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn test_always_retryable_status_is_attempted_max_retries_times() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let err = common::source_client(&server, 4)
        .fetch_page(&cursor(), 1, 50)
        .await
        .unwrap_err();

    match err {
        SyncError::SourceUnavailable(msg) => {
            assert!(msg.contains("4 attempts"), "{msg}");
            assert!(msg.contains("429"), "{msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_client_error_fails_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .expect(1)
        .mount(&server)
        .await;

    let err = common::source_client(&server, 6)
        .fetch_page(&cursor(), 1, 50)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::SourceUnavailable(ref m) if m.contains("bad token")));
}

#[tokio::test]
async fn test_malformed_body_fails_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = common::source_client(&server, 6)
        .fetch_page(&cursor(), 1, 50)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::SourceUnavailable(ref m) if m.contains("Invalid response")));
}

#[tokio::test]
async fn test_request_timeout_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"items": [], "nextPage": false}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let api = ApiClient::new(server.uri(), common::SOURCE_TOKEN, Duration::from_millis(50)).unwrap();
    let client = SourceClient::new(api, RetryPolicy::new(2, Duration::ZERO));

    let err = client.fetch_page(&cursor(), 1, 50).await.unwrap_err();
    assert!(matches!(err, SyncError::SourceUnavailable(_)));
}

#[tokio::test]
async fn test_connection_refused_is_source_unavailable() {
    // Nothing listens on port 9 locally
    let api = ApiClient::new("http://127.0.0.1:9", "t", Duration::from_secs(1)).unwrap();
    let client = SourceClient::new(api, RetryPolicy::new(2, Duration::ZERO));

    let err = client.fetch_page(&cursor(), 1, 50).await.unwrap_err();
    assert!(matches!(err, SyncError::SourceUnavailable(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_from_config_uses_endpoint_token_and_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .and(bearer_token("configured-token"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let config = ConfigBuilder::new()
        .source(server.uri(), "configured-token")
        .max_retries(2)
        .backoff_cap_secs(0)
        .request_timeout_secs(5)
        .build();

    let err = SourceClient::from_config(&config)
        .unwrap()
        .fetch_page(&cursor(), 1, 50)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::SourceUnavailable(ref m) if m.contains("2 attempts")));
}
