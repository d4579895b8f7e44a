//! Live key/value view over a leased secret
//!
//! A [`LeasedPropertySource`] registers its secret with a
//! [`SecretLeaseContainer`] and keeps a flattened copy of the secret body in
//! step with the lease events for that secret:
//!
//! | Event                         | View                                      |
//! |-------------------------------|-------------------------------------------|
//! | `Created`                     | cleared, then filled from the new body    |
//! | `Rotated`                     | stale keys removed, new values merged in  |
//! | `Expired`, `BeforeRevocation` | cleared                                   |
//! | anything else                 | unchanged                                 |
//!
//! Rotation never passes through an empty view, so readers of keys that
//! survive a rotation always see a value.

use crate::container::SecretLeaseContainer;
use crate::error::PropertySourceError;
use crate::event::{LeaseEventKind, SecretLeaseEvent};
use crate::flatten::flatten;
use crate::listener::{LeaseListener, ListenerId};
use crate::requested::RequestedSecret;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Property map shared between the view and its listener
struct Properties {
    secret: RequestedSecret,
    values: RwLock<Map<String, Value>>,
    not_found: AtomicBool,
}

impl Properties {
    fn read(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Map<String, Value>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, fresh: Map<String, Value>) {
        let mut values = self.write();
        values.clear();
        values.extend(fresh);
    }

    fn rotate(&self, fresh: Map<String, Value>) {
        let mut values = self.write();
        values.retain(|key, _| fresh.contains_key(key));
        values.extend(fresh);
    }
}

impl LeaseListener for Properties {
    fn on_lease_event(&self, event: &SecretLeaseEvent) {
        if event.secret() != &self.secret {
            return;
        }

        match event.kind() {
            LeaseEventKind::Created { body } => self.replace(flatten(body.as_map())),
            LeaseEventKind::Rotated { body, .. } => self.rotate(flatten(body.as_map())),
            LeaseEventKind::Expired | LeaseEventKind::BeforeRevocation => self.write().clear(),
            LeaseEventKind::NotFound => self.not_found.store(true, Ordering::SeqCst),
            _ => return,
        }

        debug!(
            secret = %self.secret,
            event = event.kind().name(),
            keys = self.read().len(),
            "property view updated"
        );
    }
}

/// Flattened, continuously updated properties of one leased secret
pub struct LeasedPropertySource {
    name: String,
    properties: Arc<Properties>,
    listener: ListenerId,
    container: SecretLeaseContainer,
}

impl LeasedPropertySource {
    /// Register `secret` with `container` and wait for its first outcome
    ///
    /// A missing secret is an error unless `ignore_not_found` is set, in which
    /// case the view starts empty. Read failures that the container reports
    /// to the caller are returned as [`PropertySourceError::Unavailable`];
    /// failures it retries in the background leave the view empty until the
    /// secret is read.
    pub async fn new(
        name: impl Into<String>,
        secret: RequestedSecret,
        container: &SecretLeaseContainer,
        ignore_not_found: bool,
    ) -> Result<Self, PropertySourceError> {
        let name = name.into();
        let properties = Arc::new(Properties {
            secret: secret.clone(),
            values: RwLock::new(Map::new()),
            not_found: AtomicBool::new(false),
        });
        let listener = container.add_lease_listener(properties.clone());

        let source = Self {
            name,
            properties,
            listener,
            container: container.clone(),
        };

        match container.add_requested_secret(secret.clone()).await {
            Ok(_) => {}
            Err(err) => {
                return Err(match err.backend_error() {
                    Some(backend) => PropertySourceError::Unavailable {
                        path: secret.path().to_string(),
                        message: backend.to_string(),
                    },
                    None => PropertySourceError::Container(err),
                });
            }
        }

        if source.properties.not_found.load(Ordering::SeqCst) {
            if !ignore_not_found {
                return Err(PropertySourceError::NotFound {
                    path: secret.path().to_string(),
                });
            }
            info!(name = %source.name, secret = %secret, "secret not found, property source is empty");
        }

        // Already-registered secrets publish nothing on registration
        if source.properties.read().is_empty() {
            if let Some(body) = container.secret_data(&secret) {
                source.properties.replace(flatten(body.as_map()));
            }
        }

        debug!(
            name = %source.name,
            secret = %secret,
            keys = source.len(),
            "property source ready"
        );
        Ok(source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn secret(&self) -> &RequestedSecret {
        &self.properties.secret
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.properties.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.properties.read().contains_key(key)
    }

    /// Property keys in document order
    pub fn keys(&self) -> Vec<String> {
        self.properties.read().keys().cloned().collect()
    }

    /// Copy of the current properties
    pub fn snapshot(&self) -> Map<String, Value> {
        self.properties.read().clone()
    }

    pub fn len(&self) -> usize {
        self.properties.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.read().is_empty()
    }
}

impl Drop for LeasedPropertySource {
    fn drop(&mut self) {
        self.container.remove_lease_listener(self.listener);
    }
}

impl std::fmt::Debug for LeasedPropertySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeasedPropertySource")
            .field("name", &self.name)
            .field("secret", &self.properties.secret)
            .field("keys", &self.len())
            .finish()
    }
}
