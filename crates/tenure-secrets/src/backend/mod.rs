//! Secret backend client interface
//!
//! The lease container talks to the secret service only through
//! [`SecretBackend`]; [`VaultBackend`] is the HTTP implementation.

pub mod vault;

use crate::event::SecretBody;
use crate::lease::Lease;
use async_trait::async_trait;
use thiserror::Error;

pub use vault::VaultBackend;

/// Secret data plus lease metadata returned by a read
#[derive(Debug, Clone)]
pub struct SecretResponse {
    pub data: SecretBody,
    /// [`Lease::None`] when the backend returned no lease metadata
    pub lease: Lease,
}

impl SecretResponse {
    pub fn new(data: SecretBody, lease: Lease) -> Self {
        Self { data, lease }
    }
}

/// Errors returned by a secret backend
///
/// Clonable so the same error can be published to listeners and returned to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No secret exists at the path
    #[error("Secret not found: {path}")]
    NotFound { path: String },

    /// The lease is unknown, expired, or no longer renewable on the server
    #[error("Lease no longer valid: {lease_id}")]
    LeaseNotFound { lease_id: String },

    /// Unexpected HTTP status
    #[error("Vault returned {status} for {path}: {message}")]
    Status {
        status: u16,
        path: String,
        message: String,
    },

    /// Connection, TLS, or timeout failure
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The response could not be understood
    #[error("Malformed response for {path}: {message}")]
    Decode { path: String, message: String },

    /// Address or token missing
    #[error("Vault not configured (VAULT_ADDR and VAULT_TOKEN required)")]
    NotConfigured,
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }

    pub fn is_lease_not_found(&self) -> bool {
        matches!(self, BackendError::LeaseNotFound { .. })
    }

    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport { .. } => true,
            BackendError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Authenticated access to the remote secret service
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Read the secret at `path`
    ///
    /// Returns [`BackendError::NotFound`] when nothing is stored there.
    async fn read(&self, path: &str) -> Result<SecretResponse, BackendError>;

    /// Renew `lease`, which was issued for `path`
    ///
    /// Returns [`BackendError::LeaseNotFound`] when the server no longer
    /// accepts the lease.
    async fn renew(&self, lease: &Lease, path: &str) -> Result<Lease, BackendError>;

    /// Revoke the lease with `lease_id`
    async fn revoke(&self, lease_id: &str) -> Result<(), BackendError>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
