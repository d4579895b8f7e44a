//! Lease value type

use std::time::Duration;

/// A lease granted by the backend for a secret
///
/// Static secrets carry [`Lease::None`]. The sentinel is its own variant, so a
/// granted lease with an empty id and zero duration is still a granted lease.
/// Leases are never mutated; renewal and rotation produce a new value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Lease {
    /// The secret was returned without lease metadata
    #[default]
    None,

    /// A lease issued by the backend
    Granted {
        id: String,
        duration: Duration,
        renewable: bool,
    },
}

impl Lease {
    pub fn new(id: impl Into<String>, duration: Duration, renewable: bool) -> Self {
        Lease::Granted {
            id: id.into(),
            duration,
            renewable,
        }
    }

    /// The "no lease" sentinel
    pub fn none() -> Self {
        Lease::None
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Lease::None)
    }

    /// Lease id, empty for [`Lease::None`]
    pub fn id(&self) -> &str {
        match self {
            Lease::None => "",
            Lease::Granted { id, .. } => id,
        }
    }

    /// Lease duration, zero for [`Lease::None`]
    pub fn duration(&self) -> Duration {
        match self {
            Lease::None => Duration::ZERO,
            Lease::Granted { duration, .. } => *duration,
        }
    }

    pub fn is_renewable(&self) -> bool {
        match self {
            Lease::None => false,
            Lease::Granted { renewable, .. } => *renewable,
        }
    }

    /// Whether the lease has an id the backend can revoke
    pub fn is_revocable(&self) -> bool {
        !self.id().is_empty()
    }
}

impl std::fmt::Display for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lease::None => write!(f, "no lease"),
            Lease::Granted {
                id,
                duration,
                renewable,
            } => write!(
                f,
                "lease {} ({}s, {})",
                if id.is_empty() { "<anonymous>" } else { id },
                duration.as_secs(),
                if *renewable { "renewable" } else { "non-renewable" }
            ),
        }
    }
}
