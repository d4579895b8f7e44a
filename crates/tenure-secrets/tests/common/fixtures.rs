//! Secret bodies, lease responses, and backend errors

use serde_json::{json, Value};
use std::time::Duration;
use tenure_core::types::LeaseConfig;
use tenure_secrets::{BackendError, Lease, SecretBody, SecretResponse};

pub const APP_PATH: &str = "kv/app";
pub const DB_PATH: &str = "database/creds/app";

pub fn body(value: Value) -> SecretBody {
    match value {
        Value::Object(map) => SecretBody::new(map),
        other => panic!("secret body must be an object, got {}", other),
    }
}

pub fn credentials() -> SecretBody {
    body(json!({"username": "app", "password": "hunter2"}))
}

pub fn lease(id: &str, secs: u64, renewable: bool) -> Lease {
    Lease::new(id, Duration::from_secs(secs), renewable)
}

/// Successful read carrying a lease
pub fn leased(id: &str, secs: u64, renewable: bool, data: Value) -> Result<SecretResponse, BackendError> {
    Ok(SecretResponse::new(body(data), lease(id, secs, renewable)))
}

/// Successful read of a static secret
pub fn static_secret(data: Value) -> Result<SecretResponse, BackendError> {
    Ok(SecretResponse::new(body(data), Lease::none()))
}

pub fn not_found(path: &str) -> BackendError {
    BackendError::NotFound {
        path: path.to_string(),
    }
}

pub fn lease_not_found(id: &str) -> BackendError {
    BackendError::LeaseNotFound {
        lease_id: id.to_string(),
    }
}

pub fn transport() -> BackendError {
    BackendError::Transport {
        message: "connection reset by peer".to_string(),
    }
}

/// Default configuration with a smaller failure budget
pub fn config_with_budget(max_attempts: u32) -> LeaseConfig {
    let mut config = LeaseConfig::default();
    config.failure_backoff.max_attempts = max_attempts;
    config
}
