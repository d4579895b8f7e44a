//! Type definitions for Tenure configuration

mod lease_config;
mod retry_policy;
mod tenure_config;

pub use lease_config::*;
pub use retry_policy::*;
pub use tenure_config::*;
