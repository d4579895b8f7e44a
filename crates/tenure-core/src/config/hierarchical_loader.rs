//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Global config (~/.tenure/config.yaml)
//! 3. Explicit config file (--config)
//! 4. Environment variables (VAULT_* and TENURE_* prefixes)
//! 5. CLI flags (handled by caller)
//!
//! Files are merged key by key, so a project file that only sets
//! `lease.renewal-factor` keeps the Vault address from the global file.

use crate::error::{Error, Result};
use crate::types::TenureConfig;
use crate::utils::get_home_dir;
use camino::{Utf8Path, Utf8PathBuf};
use serde_yaml_ng::Value;
use std::env;
use std::fs;
use std::str::FromStr;
use tracing::debug;

const GLOBAL_CONFIG_FILE: &str = "config.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for global configuration files
    config_dir: Utf8PathBuf,
}

impl HierarchicalConfigLoader {
    /// Create a loader rooted at `~/.tenure`
    pub fn new() -> Result<Self> {
        let home = get_home_dir().map_err(|e| Error::invalid_config(e.to_string()))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::invalid_config(format!("Non UTF-8 home directory: {:?}", p)))?;

        Ok(Self {
            config_dir: home.join(".tenure"),
        })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Load configuration with hierarchical precedence
    ///
    /// `explicit` must exist when given; the global file is optional.
    pub fn load(&self, explicit: Option<&Utf8Path>) -> Result<TenureConfig> {
        let mut merged = Value::Mapping(Default::default());

        let global_path = self.config_dir.join(GLOBAL_CONFIG_FILE);
        if global_path.exists() {
            debug!("Loading global config from {}", global_path);
            merge_values(&mut merged, Self::load_yaml_file(&global_path)?);
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::config_not_found(path.as_str()));
            }
            debug!("Loading config from {}", path);
            merge_values(&mut merged, Self::load_yaml_file(path)?);
        }

        let config: TenureConfig = serde_yaml_ng::from_value(merged)
            .map_err(|e| Error::invalid_config(format!("Failed to parse configuration: {}", e)))?;

        let config = Self::apply_env_overrides(config)?;
        config.lease.validate()?;

        Ok(config)
    }

    /// Load a YAML file into an untyped value
    fn load_yaml_file(path: &Utf8Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        let value: Value = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;

        // An empty file parses as null
        Ok(match value {
            Value::Null => Value::Mapping(Default::default()),
            other => other,
        })
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: TenureConfig) -> Result<TenureConfig> {
        if let Ok(val) = env::var("VAULT_ADDR") {
            config.vault.address = val;
        }
        if let Ok(val) = env::var("VAULT_TOKEN") {
            config.vault.token = val;
        }
        if let Ok(val) = env::var("VAULT_NAMESPACE") {
            config.vault.namespace = Some(val);
        }
        if let Some(val) = parse_env("VAULT_TIMEOUT")? {
            config.vault.timeout_secs = val;
        }

        let lease = &mut config.lease;
        if let Some(val) = parse_env("TENURE_RENEWAL_FACTOR")? {
            lease.renewal_factor = val;
        }
        if let Some(val) = parse_env("TENURE_MIN_RENEWAL_MS")? {
            lease.min_renewal_ms = val;
        }
        if let Some(val) = parse_env("TENURE_EXPIRY_THRESHOLD_MS")? {
            lease.expiry_threshold_ms = val;
        }
        if let Some(val) = parse_env("TENURE_MAX_SLEEP_MS")? {
            lease.max_sleep_ms = val;
        }
        if let Some(val) = parse_env("TENURE_SHUTDOWN_TIMEOUT_MS")? {
            lease.shutdown_timeout_ms = val;
        }
        if let Some(val) = parse_env("TENURE_MAX_RENEWAL_FAILURES")? {
            lease.failure_backoff.max_attempts = val;
        }
        if let Ok(val) = env::var("TENURE_REVOKE_ON_REMOVE") {
            lease.revoke_on_remove = parse_bool(&val);
        }
        if let Ok(val) = env::var("TENURE_REVOKE_ON_SHUTDOWN") {
            lease.revoke_on_shutdown = parse_bool(&val);
        }

        Ok(config)
    }
}

/// Read and parse an environment variable, if set
fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_config(format!("{} has an invalid value: {}", name, val))),
        Err(_) => Ok(None),
    }
}

fn parse_bool(val: &str) -> bool {
    matches!(val.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, anything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => merge_values(base_value, overlay_value),
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
