//! Retry execution engine with policy-based backoff
//!
//! Two consumers share these policies:
//!
//! - The Vault HTTP client retries a single request on transient transport
//!   failures through [`RetryExecutor`].
//! - The lease container does not block on retries; it asks
//!   [`calculate_delay`] when to revisit a lease whose renewal failed.
//!
//! # Example
//!
//! ```rust,no_run
//! use tenure_core::retry::{RetryError, RetryExecutor};
//! use tenure_core::types::RetryPolicy;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     RetryExecutor::new(RetryPolicy::default())
//!         .execute(|| async { Ok("success".to_string()) })
//!         .await
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::RetryExecutor;
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use strategies::{calculate_delay, AlwaysRetry, RetryPredicate};
