//! # tenure-secrets
//!
//! Lease lifecycle management for Vault secrets:
//! - [`SecretLeaseContainer`]: tracks requested secrets, renews or rotates
//!   their leases ahead of expiry, and publishes every transition
//! - [`SecretLeaseEvent`] and the listener traits for consuming those events
//! - [`SecretBackend`] with the [`VaultBackend`] HTTP implementation
//! - [`LeasedPropertySource`]: a flattened, live key/value view of a secret
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenure_core::HierarchicalConfigLoader;
//! use tenure_secrets::{LeasedPropertySource, RequestedSecret, SecretLeaseContainer, VaultBackend};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = HierarchicalConfigLoader::new()?.load(None)?;
//! let backend = Arc::new(VaultBackend::new(config.vault)?);
//! let container = SecretLeaseContainer::new(backend, config.lease)?;
//!
//! let database = LeasedPropertySource::new(
//!     "database",
//!     RequestedSecret::rotating("database/creds/app"),
//!     &container,
//!     false,
//! )
//! .await?;
//! container.start()?;
//!
//! println!("user = {:?}", database.get("username"));
//! container.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod container;
pub mod error;
pub mod event;
pub mod flatten;
pub mod lease;
pub mod listener;
pub mod property_source;
pub mod requested;

pub use backend::{BackendError, SecretBackend, SecretResponse, VaultBackend};
pub use container::SecretLeaseContainer;
pub use error::{ContainerError, PropertySourceError};
pub use event::{LeaseEventKind, SecretBody, SecretLeaseEvent};
pub use lease::Lease;
pub use listener::{LeaseErrorListener, LeaseEventPublisher, LeaseListener, ListenerId};
pub use property_source::LeasedPropertySource;
pub use requested::RequestedSecret;
pub use tenure_core::types::RenewalMode;
