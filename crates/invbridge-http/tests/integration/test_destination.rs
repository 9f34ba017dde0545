//! DestinationClient against a mocked Optima

use wiremock::matchers::{bearer_token, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use invbridge_core::config::ConfigBuilder;
use invbridge_core::domain::{RecordId, SyncError, TransformedDocument};
use invbridge_core::ports::IDestinationSystem;
use invbridge_http::DestinationClient;

use crate::common;

fn document() -> TransformedDocument {
    TransformedDocument {
        source_id: RecordId::new("FTMS-1").unwrap(),
        body: serde_json::json!({"docNo": "FV/FTMS-1", "currency": "PLN"}),
    }
}

#[tokio::test]
async fn test_upsert_posts_document_and_returns_external_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/invoices/upsert"))
        .and(bearer_token(common::DESTINATION_TOKEN))
        .and(body_json(serde_json::json!({"docNo": "FV/FTMS-1", "currency": "PLN"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"externalId": "OPT-77"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let id = common::destination_client(&server, 3)
        .upsert(&document())
        .await
        .unwrap();

    assert_eq!(id.as_str(), "OPT-77");
}

#[tokio::test]
async fn test_upsert_retries_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/invoices/upsert"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/invoices/upsert"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"externalId": "OPT-1"})),
        )
        .mount(&server)
        .await;

    let id = common::destination_client(&server, 3)
        .upsert(&document())
        .await
        .unwrap();
    assert_eq!(id.as_str(), "OPT-1");
}

#[tokio::test]
async fn test_upsert_exhaustion_is_destination_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/invoices/upsert"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = common::destination_client(&server, 3)
        .upsert(&document())
        .await
        .unwrap_err();

    match &err {
        SyncError::DestinationUnavailable(msg) => {
            assert!(msg.contains("FTMS-1"), "{msg}");
            assert!(msg.contains("3 attempts"), "{msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_validation_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/invoices/upsert"))
        .respond_with(ResponseTemplate::new(422).set_body_string("docNo required"))
        .expect(1)
        .mount(&server)
        .await;

    let err = common::destination_client(&server, 6)
        .upsert(&document())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::DestinationUnavailable(ref m) if m.contains("docNo required")));
}

#[tokio::test]
async fn test_missing_external_id_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/invoices/upsert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let err = common::destination_client(&server, 6)
        .upsert(&document())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::DestinationUnavailable(ref m) if m.contains("externalId")));
}

#[tokio::test]
async fn test_from_config_posts_to_configured_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/invoices/upsert"))
        .and(bearer_token("configured-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"externalId": "OPT-9"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = ConfigBuilder::new()
        .destination(server.uri(), "configured-token")
        .build();

    let id = DestinationClient::from_config(&config)
        .unwrap()
        .upsert(&document())
        .await
        .unwrap();

    assert_eq!(id.as_str(), "OPT-9");
}
