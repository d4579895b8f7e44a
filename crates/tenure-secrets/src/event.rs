//! Lease lifecycle events

use crate::backend::BackendError;
use crate::lease::Lease;
use crate::requested::RequestedSecret;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Secret document returned by the backend
///
/// Cheap to clone. `Debug` never prints values.
#[derive(Clone, Default, PartialEq)]
pub struct SecretBody(Arc<Map<String, Value>>);

impl SecretBody {
    pub fn new(data: Map<String, Value>) -> Self {
        Self(Arc::new(data))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for SecretBody {
    fn from(data: Map<String, Value>) -> Self {
        Self::new(data)
    }
}

impl std::fmt::Debug for SecretBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBody([REDACTED {} keys])", self.0.len())
    }
}

/// What happened to a lease
#[derive(Debug, Clone)]
pub enum LeaseEventKind {
    /// The secret was read, either on registration or when recovering a lost lease
    Created { body: SecretBody },

    /// The lease was extended; the secret value is unchanged
    Renewed,

    /// A fresh secret replaced the previous one
    Rotated { previous: Lease, body: SecretBody },

    /// The lease ran out or the failure budget was exhausted; terminal
    Expired,

    /// The secret is about to be removed and its lease revoked
    BeforeRevocation,

    /// The lease was revoked (or revocation was skipped or failed)
    AfterRevocation,

    /// The backend has no secret at the requested path
    NotFound,

    /// A backend call failed; delivered on the error channel
    Error { error: BackendError },
}

impl LeaseEventKind {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            LeaseEventKind::Created { .. } => "created",
            LeaseEventKind::Renewed => "renewed",
            LeaseEventKind::Rotated { .. } => "rotated",
            LeaseEventKind::Expired => "expired",
            LeaseEventKind::BeforeRevocation => "before-revocation",
            LeaseEventKind::AfterRevocation => "after-revocation",
            LeaseEventKind::NotFound => "not-found",
            LeaseEventKind::Error { .. } => "error",
        }
    }
}

/// Event about one requested secret and its lease
#[derive(Debug, Clone)]
pub struct SecretLeaseEvent {
    secret: RequestedSecret,
    lease: Lease,
    kind: LeaseEventKind,
}

impl SecretLeaseEvent {
    pub fn new(secret: RequestedSecret, lease: Lease, kind: LeaseEventKind) -> Self {
        Self {
            secret,
            lease,
            kind,
        }
    }

    pub fn created(secret: RequestedSecret, lease: Lease, body: SecretBody) -> Self {
        Self::new(secret, lease, LeaseEventKind::Created { body })
    }

    pub fn rotated(
        secret: RequestedSecret,
        previous: Lease,
        lease: Lease,
        body: SecretBody,
    ) -> Self {
        Self::new(secret, lease, LeaseEventKind::Rotated { previous, body })
    }

    pub fn error(secret: RequestedSecret, lease: Lease, error: BackendError) -> Self {
        Self::new(secret, lease, LeaseEventKind::Error { error })
    }

    /// The registration this event is about
    pub fn secret(&self) -> &RequestedSecret {
        &self.secret
    }

    /// The lease after the transition; [`Lease::None`] when none applies
    pub fn lease(&self) -> &Lease {
        &self.lease
    }

    pub fn kind(&self) -> &LeaseEventKind {
        &self.kind
    }

    /// Secret document carried by Created and Rotated events
    pub fn body(&self) -> Option<&SecretBody> {
        match &self.kind {
            LeaseEventKind::Created { body } | LeaseEventKind::Rotated { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Error carried by Error events
    pub fn backend_error(&self) -> Option<&BackendError> {
        match &self.kind {
            LeaseEventKind::Error { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, LeaseEventKind::Error { .. })
    }
}
