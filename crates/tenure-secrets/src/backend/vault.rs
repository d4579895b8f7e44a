//! HashiCorp Vault backend over the HTTP API
//!
//! - Reads: `GET /v1/<path>`; KV v2 documents (`data.data`) are unwrapped.
//! - Renewal: `PUT /v1/sys/leases/renew` with the current duration as increment.
//! - Revocation: `PUT /v1/sys/leases/revoke`.
//!
//! Transient failures (connection errors, timeouts, 5xx, 429) are retried
//! per request using the configured `request-retry` policy.

use super::{BackendError, SecretBackend, SecretResponse};
use crate::event::SecretBody;
use crate::lease::Lease;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tenure_core::retry::{RetryError, RetryExecutor, TracingObserver};
use tenure_core::types::VaultSettings;
use tracing::{debug, warn};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

pub struct VaultBackend {
    settings: VaultSettings,
    client: Client,
}

/// Response envelope shared by logical reads and lease operations
#[derive(Debug, Deserialize)]
struct VaultResponse {
    #[serde(default)]
    lease_id: String,
    #[serde(default)]
    lease_duration: u64,
    #[serde(default)]
    renewable: bool,
    #[serde(default)]
    data: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct VaultErrors {
    #[serde(default)]
    errors: Vec<String>,
}

impl VaultBackend {
    pub fn new(settings: VaultSettings) -> Result<Self, BackendError> {
        if !settings.is_configured() {
            return Err(BackendError::NotConfigured);
        }

        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| BackendError::Transport {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.settings.address.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header(TOKEN_HEADER, &self.settings.token);

        if let Some(namespace) = &self.settings.namespace {
            builder = builder.header(NAMESPACE_HEADER, namespace);
        }

        builder
    }

    /// Send a request, retrying transient failures
    ///
    /// Non-transient error statuses are handed back as responses so each
    /// operation can interpret them.
    async fn send<F>(
        &self,
        operation: &'static str,
        path: &str,
        build: F,
    ) -> Result<Response, BackendError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let executor = RetryExecutor::new(self.settings.request_retry.clone())
            .with_predicate(|e: &BackendError| e.is_transient())
            .with_observer(TracingObserver::new(operation));

        executor
            .execute(|| {
                let request = build();
                async move {
                    let response = request.send().await.map_err(|e| BackendError::Transport {
                        message: e.to_string(),
                    })?;

                    let status = response.status();
                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        return Err(status_error(status, path, response).await);
                    }

                    Ok(response)
                }
            })
            .await
            .map_err(RetryError::into_source)
    }

    async fn decode(path: &str, response: Response) -> Result<VaultResponse, BackendError> {
        response
            .json::<VaultResponse>()
            .await
            .map_err(|e| BackendError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            })
    }
}

/// Build a status error from the response's `errors` array
async fn status_error(status: StatusCode, path: &str, response: Response) -> BackendError {
    let errors = response.json::<VaultErrors>().await.unwrap_or_default();

    BackendError::Status {
        status: status.as_u16(),
        path: path.to_string(),
        message: if errors.errors.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            errors.errors.join("; ")
        },
    }
}

/// Unwrap KV v2 documents, which nest the secret under `data.data`
fn unwrap_kv2(mut data: Map<String, Value>) -> Map<String, Value> {
    let is_kv2 = data.len() == 2
        && data.contains_key("metadata")
        && matches!(data.get("data"), Some(Value::Object(_)));

    if is_kv2 {
        if let Some(Value::Object(inner)) = data.remove("data") {
            return inner;
        }
    }

    data
}

fn lease_from(response: &VaultResponse) -> Lease {
    if response.lease_id.is_empty() && response.lease_duration == 0 {
        Lease::none()
    } else {
        Lease::new(
            response.lease_id.clone(),
            Duration::from_secs(response.lease_duration),
            response.renewable,
        )
    }
}

#[async_trait]
impl SecretBackend for VaultBackend {
    async fn read(&self, path: &str) -> Result<SecretResponse, BackendError> {
        let response = self
            .send("vault-read", path, || self.request(Method::GET, path))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(BackendError::NotFound {
                    path: path.to_string(),
                })
            }
            status if !status.is_success() => return Err(status_error(status, path, response).await),
            _ => {}
        }

        let body = Self::decode(path, response).await?;
        let lease = lease_from(&body);
        let data = unwrap_kv2(body.data.unwrap_or_default());

        debug!(path = %path, lease = %lease, keys = data.len(), "read secret from Vault");
        Ok(SecretResponse::new(SecretBody::new(data), lease))
    }

    async fn renew(&self, lease: &Lease, path: &str) -> Result<Lease, BackendError> {
        let payload = json!({
            "lease_id": lease.id(),
            "increment": lease.duration().as_secs(),
        });

        let response = self
            .send("vault-renew", path, || {
                self.request(Method::PUT, "sys/leases/renew").json(&payload)
            })
            .await?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                let reason = status_error(response.status(), path, response).await;
                debug!(lease_id = %lease.id(), error = %reason, "Vault rejected lease renewal");
                return Err(BackendError::LeaseNotFound {
                    lease_id: lease.id().to_string(),
                });
            }
            status if !status.is_success() => return Err(status_error(status, path, response).await),
            _ => {}
        }

        let body = Self::decode(path, response).await?;
        let renewed = lease_from(&body);

        // Renewal must return a lease; an empty envelope means the server lost it
        if renewed.is_none() || renewed.duration().is_zero() {
            warn!(lease_id = %lease.id(), "renewal returned no remaining duration");
            return Err(BackendError::LeaseNotFound {
                lease_id: lease.id().to_string(),
            });
        }

        Ok(renewed)
    }

    async fn revoke(&self, lease_id: &str) -> Result<(), BackendError> {
        let payload = json!({ "lease_id": lease_id });

        let response = self
            .send("vault-revoke", lease_id, || {
                self.request(Method::PUT, "sys/leases/revoke").json(&payload)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, lease_id, response).await);
        }

        debug!(lease_id = %lease_id, "revoked lease");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "vault"
    }
}
