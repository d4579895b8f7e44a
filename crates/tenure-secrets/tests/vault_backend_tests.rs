//! Vault HTTP backend tests
//!
//! Tests cover:
//! - Logical reads, lease metadata, and KV v2 unwrapping
//! - Token and namespace headers
//! - Status mapping (404, 400, 403)
//! - Lease renewal and revocation requests
//! - Retries of transient failures using wiremock

mod common;

use common::*;
use serde_json::json;
use std::time::Duration;
use tenure_secrets::{BackendError, Lease, SecretBackend, VaultBackend};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_read_dynamic_secret() {
    let server = MockServer::start().await;
    mock_read(
        &server,
        DB_PATH,
        read_envelope(
            "database/creds/app/abc123",
            3600,
            true,
            json!({"username": "v-app-x1", "password": "A1a-secret"}),
        ),
    )
    .await;

    let response = vault_backend(&server).read(DB_PATH).await.unwrap();

    assert_eq!(
        response.lease,
        Lease::new("database/creds/app/abc123", Duration::from_secs(3600), true)
    );
    assert_eq!(response.data.get("username"), Some(&json!("v-app-x1")));
}

#[tokio::test]
async fn test_read_kv2_unwraps_document() {
    let server = MockServer::start().await;
    mock_read(
        &server,
        "secret/data/app",
        read_envelope(
            "",
            0,
            false,
            json!({
                "data": {"api-key": "k-123"},
                "metadata": {"version": 4, "created_time": "2024-01-01T00:00:00Z"}
            }),
        ),
    )
    .await;

    let response = vault_backend(&server).read("secret/data/app").await.unwrap();

    assert!(response.lease.is_none());
    assert_eq!(response.data.len(), 1);
    assert_eq!(response.data.get("api-key"), Some(&json!("k-123")));
}

#[tokio::test]
async fn test_read_sends_token_and_namespace() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/app"))
        .and(header("X-Vault-Token", TEST_TOKEN))
        .and(header("X-Vault-Namespace", "team-a"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(read_envelope("", 0, false, json!({"k": "v"}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = vault_settings(&server);
    settings.namespace = Some("team-a".to_string());
    let backend = VaultBackend::new(settings).unwrap();

    let response = backend.read(APP_PATH).await.unwrap();
    assert_eq!(response.data.get("k"), Some(&json!("v")));
}

#[tokio::test]
async fn test_read_not_found() {
    let server = MockServer::start().await;
    mock_error(&server, "GET", "/v1/kv/missing", 404, &[]).await;

    let err = vault_backend(&server).read("kv/missing").await.unwrap_err();
    assert_eq!(
        err,
        BackendError::NotFound {
            path: "kv/missing".to_string()
        }
    );
}

#[tokio::test]
async fn test_read_permission_denied_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/app"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"errors": ["permission denied"]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = vault_backend(&server).read(APP_PATH).await.unwrap_err();
    match err {
        BackendError::Status {
            status, message, ..
        } => {
            assert_eq!(status, 403);
            assert_eq!(message, "permission denied");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_read_retries_transient_failures() {
    let server = MockServer::start().await;
    mock_flaky_read(
        &server,
        APP_PATH,
        2,
        read_envelope("", 0, false, json!({"k": "v"})),
    )
    .await;

    let response = vault_backend(&server).read(APP_PATH).await.unwrap();
    assert_eq!(response.data.get("k"), Some(&json!("v")));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_read_gives_up_after_retry_budget() {
    let server = MockServer::start().await;
    mock_error(&server, "GET", "/v1/kv/app", 503, &["Vault is sealed"]).await;

    let err = vault_backend(&server).read(APP_PATH).await.unwrap_err();
    assert!(err.is_transient());
    assert!(err.to_string().contains("Vault is sealed"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_renew_lease() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/leases/renew"))
        .and(body_json(json!({
            "lease_id": "database/creds/app/abc123",
            "increment": 3600
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lease_id": "database/creds/app/abc123",
            "lease_duration": 1800,
            "renewable": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let current = Lease::new("database/creds/app/abc123", Duration::from_secs(3600), true);
    let renewed = vault_backend(&server)
        .renew(&current, DB_PATH)
        .await
        .unwrap();

    assert_eq!(
        renewed,
        Lease::new("database/creds/app/abc123", Duration::from_secs(1800), true)
    );
}

#[tokio::test]
async fn test_renew_unknown_lease() {
    let server = MockServer::start().await;
    mock_error(
        &server,
        "PUT",
        "/v1/sys/leases/renew",
        400,
        &["lease not found or lease is not renewable"],
    )
    .await;

    let current = Lease::new("database/creds/app/gone", Duration::from_secs(60), true);
    let err = vault_backend(&server)
        .renew(&current, DB_PATH)
        .await
        .unwrap_err();

    assert!(err.is_lease_not_found());
}

#[tokio::test]
async fn test_renew_with_zero_duration_means_lease_is_gone() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/leases/renew"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lease_id": "database/creds/app/abc123",
            "lease_duration": 0,
            "renewable": false
        })))
        .mount(&server)
        .await;

    let current = Lease::new("database/creds/app/abc123", Duration::from_secs(60), true);
    let err = vault_backend(&server)
        .renew(&current, DB_PATH)
        .await
        .unwrap_err();

    assert!(err.is_lease_not_found());
}

#[tokio::test]
async fn test_revoke_lease() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/leases/revoke"))
        .and(body_json(json!({"lease_id": "database/creds/app/abc123"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    vault_backend(&server)
        .revoke("database/creds/app/abc123")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_revoke_failure_is_reported() {
    let server = MockServer::start().await;
    mock_error(&server, "PUT", "/v1/sys/leases/revoke", 403, &["permission denied"]).await;

    let err = vault_backend(&server).revoke("some/lease").await.unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 403, .. }));
}

#[tokio::test]
async fn test_transport_failure() {
    // Nothing listens on the discard port
    let mut settings = vault_settings(&MockServer::start().await);
    settings.address = "http://127.0.0.1:9".to_string();
    settings.request_retry.max_attempts = 1;
    let backend = VaultBackend::new(settings).unwrap();

    let err = backend.read(APP_PATH).await.unwrap_err();
    assert!(matches!(err, BackendError::Transport { .. }));
}
