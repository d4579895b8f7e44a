//! Config command

use super::load_config;
use crate::cli::{ConfigCommands, ConfigShowArgs};
use crate::output;
use anyhow::{Context, Result};
use camino::Utf8Path;
use tenure_core::TenureConfig;

pub fn run(cmd: ConfigCommands, config_path: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => show(args, config_path),
        ConfigCommands::Validate => validate(config_path),
    }
}

fn show(args: ConfigShowArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = redacted(load_config(config_path)?);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let yaml = serde_yaml_ng::to_string(&config).context("Failed to render configuration")?;
        print!("{}", yaml);
    }

    Ok(())
}

fn validate(config_path: Option<&Utf8Path>) -> Result<()> {
    let config = load_config(config_path)?;

    output::success("Configuration is valid");
    output::kv(
        "vault",
        if config.vault.address.is_empty() {
            "<not set>"
        } else {
            config.vault.address.as_str()
        },
    );
    output::kv(
        "token",
        if config.vault.token.is_empty() {
            "<not set>"
        } else {
            "set"
        },
    );
    output::kv("renewal factor", &config.lease.renewal_factor.to_string());
    output::kv(
        "failure budget",
        &config.lease.max_renewal_failures().to_string(),
    );
    output::kv("secrets", &config.secrets.len().to_string());

    if !config.vault.is_configured() {
        output::warning("Vault address or token is missing, get and watch will fail");
    }

    Ok(())
}

fn redacted(mut config: TenureConfig) -> TenureConfig {
    config.vault = config.vault.redacted();
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_never_prints_token() {
        let mut config = TenureConfig::default();
        config.vault.address = "https://vault.example.com".to_string();
        config.vault.token = "s.super-secret".to_string();

        let yaml = serde_yaml_ng::to_string(&redacted(config)).unwrap();

        assert!(!yaml.contains("super-secret"));
        assert!(yaml.contains("[REDACTED]"));
        assert!(yaml.contains("https://vault.example.com"));
    }

    #[test]
    fn test_show_round_trips_through_loader_format() {
        let config = redacted(TenureConfig::default());
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        let parsed: TenureConfig = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
