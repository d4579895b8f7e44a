//! # tenure-core
//!
//! Core library for Tenure providing:
//! - Configuration types for the Vault client and the lease container
//! - Hierarchical configuration loading (defaults, files, environment)
//! - Retry execution engine with policy-based backoff

pub mod config;
pub mod error;
pub mod retry;
pub mod types;
pub mod utils;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use types::{LeaseConfig, RenewalMode, RetryPolicy, RetryStrategy, TenureConfig};
pub use utils::get_home_dir;
