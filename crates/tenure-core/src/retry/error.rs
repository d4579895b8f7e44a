//! Error types for the retry execution engine

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during retry execution
///
/// Generic over `E`, the error type of the operation being retried.
#[derive(Debug, Error)]
pub enum RetryError<E: std::fmt::Display> {
    /// All attempts failed with retryable errors
    #[error("retry exhausted after {attempts} attempts over {:.2}s: {last_error}", total_duration.as_secs_f64())]
    Exhausted {
        attempts: u32,
        last_error: E,
        total_duration: Duration,
    },

    /// The predicate rejected the error; no further attempts were made
    #[error("non-retryable error: {0}")]
    NonRetryable(E),
}

impl<E: std::fmt::Display> RetryError<E> {
    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::NonRetryable(_) => 1,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The error from the final attempt
    pub fn into_source(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::NonRetryable(source) => source,
        }
    }
}
