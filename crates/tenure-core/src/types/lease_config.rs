//! Lease container configuration
//!
//! Controls when leases are renewed relative to their duration, how long the
//! sweep loop may sleep, what happens to leases on removal and shutdown, and
//! how many consecutive renewal failures are tolerated.

use super::retry_policy::{RetryPolicy, RetryStrategy};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a requested secret is kept alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RenewalMode {
    /// Read once; leases are tracked for expiry only
    Once,

    /// Renew the existing lease, re-reading when the lease is gone
    #[default]
    Renew,

    /// Fetch a fresh secret whenever the lease is due
    Rotate,
}

impl std::fmt::Display for RenewalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenewalMode::Once => write!(f, "once"),
            RenewalMode::Renew => write!(f, "renew"),
            RenewalMode::Rotate => write!(f, "rotate"),
        }
    }
}

impl std::str::FromStr for RenewalMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "once" => Ok(RenewalMode::Once),
            "renew" => Ok(RenewalMode::Renew),
            "rotate" => Ok(RenewalMode::Rotate),
            other => Err(Error::invalid_config(format!(
                "Unknown renewal mode '{}'. Valid modes: once, renew, rotate",
                other
            ))),
        }
    }
}

/// Lease container configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LeaseConfig {
    /// Fraction of the lease duration after which renewal is attempted
    #[serde(default = "default_renewal_factor")]
    pub renewal_factor: f64,

    /// Lower bound for the delay between issuance and renewal
    #[serde(default = "default_min_renewal")]
    pub min_renewal_ms: u64,

    /// Leases are renewed at least this long before they expire
    #[serde(default = "default_expiry_threshold")]
    pub expiry_threshold_ms: u64,

    /// Longest the sweep loop sleeps without checking for work
    #[serde(default = "default_max_sleep")]
    pub max_sleep_ms: u64,

    /// Revoke the lease when a secret is removed
    #[serde(default = "default_true")]
    pub revoke_on_remove: bool,

    /// Revoke all held leases when the container stops
    #[serde(default = "default_true")]
    pub revoke_on_shutdown: bool,

    /// How long `stop` waits for the sweep task before aborting it
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,

    /// Failure budget and backoff for scheduled renewals
    #[serde(default = "default_failure_backoff")]
    pub failure_backoff: RetryPolicy,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            renewal_factor: default_renewal_factor(),
            min_renewal_ms: default_min_renewal(),
            expiry_threshold_ms: default_expiry_threshold(),
            max_sleep_ms: default_max_sleep(),
            revoke_on_remove: true,
            revoke_on_shutdown: true,
            shutdown_timeout_ms: default_shutdown_timeout(),
            failure_backoff: default_failure_backoff(),
        }
    }
}

fn default_renewal_factor() -> f64 {
    0.8
}
fn default_min_renewal() -> u64 {
    1_000
}
fn default_expiry_threshold() -> u64 {
    1_000
}
fn default_max_sleep() -> u64 {
    60_000
}
fn default_true() -> bool {
    true
}
fn default_shutdown_timeout() -> u64 {
    10_000
}
fn default_failure_backoff() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        strategy: RetryStrategy::ExponentialBackoff,
        backoff_multiplier: 2.0,
        initial_delay_ms: 1_000,
        max_delay_ms: 60_000,
    }
}

impl LeaseConfig {
    pub fn min_renewal(&self) -> Duration {
        Duration::from_millis(self.min_renewal_ms)
    }

    pub fn expiry_threshold(&self) -> Duration {
        Duration::from_millis(self.expiry_threshold_ms)
    }

    pub fn max_sleep(&self) -> Duration {
        Duration::from_millis(self.max_sleep_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Consecutive failures tolerated before a lease is declared expired
    pub fn max_renewal_failures(&self) -> u32 {
        self.failure_backoff.max_attempts
    }

    /// Delay between lease issuance and the renewal attempt
    ///
    /// `duration * renewal_factor`, pulled in so that at least
    /// `expiry_threshold` remains, raised to `min_renewal`, and never later
    /// than the lease duration itself.
    ///
    /// A negative or non-finite factor starts from `duration` before those
    /// bounds apply. [`validate`](Self::validate) rejects such factors.
    pub fn renewal_delay(&self, duration: Duration) -> Duration {
        let mut delay = Duration::try_from_secs_f64(duration.as_secs_f64() * self.renewal_factor)
            .unwrap_or(duration);

        let threshold = self.expiry_threshold();
        if duration > threshold {
            delay = delay.min(duration - threshold);
        }

        delay.max(self.min_renewal()).min(duration)
    }

    /// Check the configuration for values the container cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.renewal_factor > 0.0 && self.renewal_factor < 1.0) {
            return Err(Error::invalid_config(format!(
                "renewal-factor must be between 0 and 1 (exclusive), got {}",
                self.renewal_factor
            )));
        }

        if self.failure_backoff.max_attempts == 0 {
            return Err(Error::invalid_config(
                "failure-backoff.max-attempts must be at least 1",
            ));
        }

        if self.max_sleep_ms == 0 {
            return Err(Error::invalid_config("max-sleep-ms must be positive"));
        }

        if self.min_renewal_ms > self.max_sleep_ms {
            return Err(Error::invalid_config(format!(
                "min-renewal-ms ({}) must not exceed max-sleep-ms ({})",
                self.min_renewal_ms, self.max_sleep_ms
            )));
        }

        Ok(())
    }
}
