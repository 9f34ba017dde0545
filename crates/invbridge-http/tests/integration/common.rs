//! Shared helpers for the adapter integration tests

use std::time::Duration;

use wiremock::MockServer;

use invbridge_http::{ApiClient, DestinationClient, RetryPolicy, SourceClient};

pub const SOURCE_TOKEN: &str = "test-firetms-token";
pub const DESTINATION_TOKEN: &str = "test-optima-token";

/// Zero cap keeps retry tests instant
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::ZERO)
}

pub fn source_client(server: &MockServer, max_retries: u32) -> SourceClient {
    let api = ApiClient::new(server.uri(), SOURCE_TOKEN, Duration::from_secs(5))
        .expect("build source client");
    SourceClient::new(api, fast_retry(max_retries))
}

pub fn destination_client(server: &MockServer, max_retries: u32) -> DestinationClient {
    let api = ApiClient::new(server.uri(), DESTINATION_TOKEN, Duration::from_secs(5))
        .expect("build destination client");
    DestinationClient::new(api, fast_retry(max_retries))
}

/// A minimal fireTMS invoice
pub fn invoice(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "number": format!("FV/{id}"),
        "issueDate": "2025-08-01",
        "buyer": {"nip": "5250001009", "name": "ACME", "address": "Warszawa"},
        "positions": [{"name": "Transport", "quantity": 1, "netPrice": 100.0, "vatRate": "23"}],
        "totals": {"net": 100.0, "vat": 23.0, "gross": 123.0},
        "updatedAt": "2025-08-01T10:00:00Z"
    })
}
