//! Top-level configuration document (`~/.tenure/config.yaml`)

use super::lease_config::{LeaseConfig, RenewalMode};
use super::retry_policy::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete Tenure configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TenureConfig {
    /// Vault connection settings
    #[serde(default)]
    pub vault: VaultSettings,

    /// Lease container behaviour
    #[serde(default)]
    pub lease: LeaseConfig,

    /// Secrets requested on startup
    #[serde(default)]
    pub secrets: Vec<SecretSpec>,
}

/// Vault connection settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VaultSettings {
    /// Vault address, e.g. `https://vault.example.com:8200`
    #[serde(default)]
    pub address: String,

    /// Client token sent as `X-Vault-Token`
    #[serde(default)]
    pub token: String,

    /// Enterprise namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retry policy for transient transport failures on a single request
    #[serde(default)]
    pub request_retry: RetryPolicy,
}

fn default_timeout() -> u64 {
    30
}

impl VaultSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether both address and token are present
    pub fn is_configured(&self) -> bool {
        !self.address.is_empty() && !self.token.is_empty()
    }

    /// Copy of these settings with the token masked, for display
    pub fn redacted(&self) -> Self {
        let mut settings = self.clone();
        if !settings.token.is_empty() {
            settings.token = "[REDACTED]".to_string();
        }
        settings
    }
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: String::new(),
            token: String::new(),
            namespace: None,
            timeout_secs: default_timeout(),
            request_retry: RetryPolicy::default(),
        }
    }
}

impl std::fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSettings")
            .field("address", &self.address)
            .field("token", &"[REDACTED]")
            .field("namespace", &self.namespace)
            .field("timeout_secs", &self.timeout_secs)
            .field("request_retry", &self.request_retry)
            .finish()
    }
}

/// A secret to request on startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SecretSpec {
    /// Secret path, e.g. `database/creds/app`
    pub path: String,

    /// How the secret is kept alive
    #[serde(default)]
    pub mode: RenewalMode,

    /// Treat a missing secret as empty instead of failing
    #[serde(default)]
    pub ignore_not_found: bool,
}
