//! Wiremock helpers for the Vault HTTP API

use serde_json::{json, Value};
use tenure_core::types::{RetryPolicy, RetryStrategy, VaultSettings};
use tenure_secrets::VaultBackend;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "s.test-token";

/// Settings pointing at `server` with fast, short retries
pub fn vault_settings(server: &MockServer) -> VaultSettings {
    VaultSettings {
        address: server.uri(),
        token: TEST_TOKEN.to_string(),
        namespace: None,
        timeout_secs: 5,
        request_retry: RetryPolicy {
            max_attempts: 3,
            strategy: RetryStrategy::FixedDelay,
            backoff_multiplier: 1.0,
            initial_delay_ms: 10,
            max_delay_ms: 10,
        },
    }
}

pub fn vault_backend(server: &MockServer) -> VaultBackend {
    VaultBackend::new(vault_settings(server)).unwrap()
}

/// Logical read response envelope
pub fn read_envelope(lease_id: &str, lease_duration: u64, renewable: bool, data: Value) -> Value {
    json!({
        "request_id": "5e2ac5b4-0f5e-4f8a-9a2c-2d4f6c7f8a90",
        "lease_id": lease_id,
        "lease_duration": lease_duration,
        "renewable": renewable,
        "data": data,
        "warnings": null
    })
}

/// Mount a 200 response for `GET /v1/<secret_path>`
pub async fn mock_read(server: &MockServer, secret_path: &str, envelope: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", secret_path)))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope))
        .mount(server)
        .await;
}

/// Mount `fail_count` 503 responses followed by a 200
pub async fn mock_flaky_read(server: &MockServer, secret_path: &str, fail_count: u64, envelope: Value) {
    // First N requests fail
    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", secret_path)))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"errors": ["Vault is sealed"]})),
        )
        .up_to_n_times(fail_count)
        .mount(server)
        .await;

    // Subsequent requests succeed
    mock_read(server, secret_path, envelope).await;
}

/// Mount an error response with Vault's `errors` array
pub async fn mock_error(server: &MockServer, http_method: &str, api_path: &str, status: u16, errors: &[&str]) {
    Mock::given(method(http_method))
        .and(path(api_path.to_string()))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "errors": errors })))
        .mount(server)
        .await;
}
