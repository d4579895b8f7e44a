//! Long-running lease watcher

use super::{load_config, vault_backend};
use crate::cli::WatchArgs;
use crate::output;
use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use std::sync::Arc;
use tenure_core::types::{SecretSpec, TenureConfig};
use tenure_secrets::{
    BackendError, LeaseEventKind, LeasedPropertySource, RequestedSecret, SecretLeaseContainer,
    SecretLeaseEvent,
};
use tracing::debug;

pub async fn run(args: WatchArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let specs = secret_specs(&config, &args);
    if specs.is_empty() {
        bail!("Nothing to watch. Pass --path or list secrets in the config file");
    }

    let backend = Arc::new(vault_backend(&config)?);
    let container = SecretLeaseContainer::new(backend, config.lease.clone())
        .context("Failed to create the lease container")?;
    container.add_lease_listener(Arc::new(report_event));
    container.add_error_listener(Arc::new(report_error));

    let sources = match register(&container, &specs).await {
        Ok(sources) => sources,
        Err(e) => {
            // Release whatever was leased before the failure
            container.stop().await;
            return Err(e);
        }
    };

    container
        .start()
        .context("Failed to start the lease container")?;
    output::info(&format!(
        "Watching {} secret(s), press Ctrl-C to stop",
        sources.len()
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    output::info("Stopping");
    container.stop().await;
    drop(sources);
    output::success("Stopped");

    Ok(())
}

/// Configured secrets followed by the ones given with `--path`
fn secret_specs(config: &TenureConfig, args: &WatchArgs) -> Vec<SecretSpec> {
    let mut specs = config.secrets.clone();
    specs.extend(args.paths.iter().map(|path| SecretSpec {
        path: path.clone(),
        mode: args.mode,
        ignore_not_found: args.ignore_not_found,
    }));
    specs
}

async fn register(
    container: &SecretLeaseContainer,
    specs: &[SecretSpec],
) -> Result<Vec<LeasedPropertySource>> {
    let mut sources = Vec::with_capacity(specs.len());
    for spec in specs {
        let secret = RequestedSecret::new(spec.path.clone(), spec.mode);
        let source = LeasedPropertySource::new(
            spec.path.clone(),
            secret,
            container,
            spec.ignore_not_found,
        )
        .await
        .with_context(|| format!("Failed to register {}", spec.path))?;
        debug!(path = %spec.path, keys = source.len(), "Registered secret");
        sources.push(source);
    }
    Ok(sources)
}

fn report_event(event: &SecretLeaseEvent) {
    let secret = event.secret();
    match event.kind() {
        LeaseEventKind::Created { body } => output::success(&format!(
            "{} created: {} ({} keys)",
            secret,
            event.lease(),
            body.len()
        )),
        LeaseEventKind::Renewed => {
            output::success(&format!("{} renewed: {}", secret, event.lease()))
        }
        LeaseEventKind::Rotated { previous, body } => output::success(&format!(
            "{} rotated: {} -> {} ({} keys)",
            secret,
            previous,
            event.lease(),
            body.len()
        )),
        LeaseEventKind::Expired => output::warning(&format!("{} expired", secret)),
        LeaseEventKind::BeforeRevocation => {
            output::info(&format!("{} revoking {}", secret, event.lease()))
        }
        LeaseEventKind::AfterRevocation => output::info(&format!("{} revoked", secret)),
        LeaseEventKind::NotFound => output::warning(&format!("{} not found", secret)),
        // Delivered to the error listener
        LeaseEventKind::Error { .. } => {}
    }
}

fn report_error(event: &SecretLeaseEvent, error: &BackendError) {
    output::error(&format!("{}: {}", event.secret(), error));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenure_core::types::RenewalMode;

    fn args(paths: &[&str], mode: RenewalMode) -> WatchArgs {
        WatchArgs {
            paths: paths.iter().map(|p| p.to_string()).collect(),
            mode,
            ignore_not_found: false,
        }
    }

    #[test]
    fn test_configured_secrets_come_first() {
        let config = TenureConfig {
            secrets: vec![SecretSpec {
                path: "database/creds/app".to_string(),
                mode: RenewalMode::Rotate,
                ignore_not_found: true,
            }],
            ..Default::default()
        };

        let specs = secret_specs(&config, &args(&["kv/app"], RenewalMode::Once));

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].path, "database/creds/app");
        assert_eq!(specs[0].mode, RenewalMode::Rotate);
        assert_eq!(specs[1].path, "kv/app");
        assert_eq!(specs[1].mode, RenewalMode::Once);
        assert!(!specs[1].ignore_not_found);
    }

    #[test]
    fn test_no_secrets() {
        let specs = secret_specs(&TenureConfig::default(), &args(&[], RenewalMode::Renew));
        assert!(specs.is_empty());
    }
}
