//! Command implementations

pub mod config;
pub mod get;
pub mod watch;

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use tenure_core::{HierarchicalConfigLoader, TenureConfig};
use tenure_secrets::VaultBackend;

/// Load the merged configuration (defaults, global file, `--config`, environment)
pub(crate) fn load_config(path: Option<&Utf8Path>) -> Result<TenureConfig> {
    let loader =
        HierarchicalConfigLoader::new().context("Failed to locate the configuration directory")?;
    loader.load(path).context("Failed to load configuration")
}

/// Build a Vault client from the loaded settings
pub(crate) fn vault_backend(config: &TenureConfig) -> Result<VaultBackend> {
    if !config.vault.is_configured() {
        bail!(
            "Vault is not configured. Set VAULT_ADDR and VAULT_TOKEN or add a vault section to the config file"
        );
    }
    VaultBackend::new(config.vault.clone()).context("Failed to create Vault client")
}
