//! One-shot secret read

use super::{load_config, vault_backend};
use crate::cli::GetArgs;
use crate::output;
use anyhow::{Context, Result};
use camino::Utf8Path;
use serde_json::{json, Map, Value};
use tenure_secrets::flatten::flatten;
use tenure_secrets::{Lease, SecretBackend};

const MASK: &str = "********";

pub async fn run(args: GetArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let backend = vault_backend(&config)?;

    let spinner = output::spinner(&format!("Reading {}...", args.path));
    let result = backend.read(&args.path).await;
    spinner.finish_and_clear();
    let response = result.with_context(|| format!("Failed to read {}", args.path))?;

    let properties = mask(flatten(response.data.as_map()), args.show_values);

    if args.json {
        let document = json!({
            "path": args.path,
            "lease": lease_json(&response.lease),
            "data": properties,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        output::header(&args.path);
        output::kv("lease", &response.lease.to_string());
        if properties.is_empty() {
            output::info("Secret has no values");
        }
        for (key, value) in &properties {
            output::kv(key, &display(value));
        }
    }

    if args.revoke && response.lease.is_revocable() {
        backend
            .revoke(response.lease.id())
            .await
            .with_context(|| format!("Failed to revoke {}", response.lease.id()))?;
        if !args.json {
            output::success(&format!("Revoked {}", response.lease.id()));
        }
    }

    Ok(())
}

/// Replace every value with a mask unless `show_values` is set
fn mask(properties: Map<String, Value>, show_values: bool) -> Map<String, Value> {
    if show_values {
        return properties;
    }
    properties
        .into_iter()
        .map(|(key, _)| (key, Value::String(MASK.to_string())))
        .collect()
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lease_json(lease: &Lease) -> Value {
    match lease {
        Lease::None => Value::Null,
        granted => json!({
            "id": granted.id(),
            "duration_secs": granted.duration().as_secs(),
            "renewable": granted.is_renewable(),
        }),
    }
}
