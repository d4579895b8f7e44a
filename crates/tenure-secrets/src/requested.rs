//! Requested secrets

use tenure_core::types::RenewalMode;

/// Registration of interest in a secret path
///
/// Two registrations are the same secret when both path and mode match, so
/// one path may be tracked once per mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestedSecret {
    path: String,
    mode: RenewalMode,
}

impl RequestedSecret {
    pub fn new(path: impl Into<String>, mode: RenewalMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    /// Read once; any lease is tracked for expiry only
    pub fn once(path: impl Into<String>) -> Self {
        Self::new(path, RenewalMode::Once)
    }

    pub fn renewable(path: impl Into<String>) -> Self {
        Self::new(path, RenewalMode::Renew)
    }

    pub fn rotating(path: impl Into<String>) -> Self {
        Self::new(path, RenewalMode::Rotate)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> RenewalMode {
        self.mode
    }
}

impl std::fmt::Display for RequestedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.path, self.mode)
    }
}
