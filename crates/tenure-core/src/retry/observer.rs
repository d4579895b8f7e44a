//! Retry observation and logging

use std::time::Duration;

/// Callbacks fired while a [`RetryExecutor`](super::RetryExecutor) runs
pub trait RetryObserver: Send + Sync {
    /// An attempt failed and another one will follow after `delay`
    fn on_attempt_failed(&self, attempt: u32, error: &dyn std::fmt::Display, delay: Duration);

    /// The operation succeeded on `attempt`
    fn on_success(&self, attempt: u32, total_duration: Duration);

    /// No attempts remain, or the error was not retryable
    fn on_gave_up(&self, attempts: u32, error: &dyn std::fmt::Display);
}

/// Observer that ignores every callback
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn std::fmt::Display, _delay: Duration) {}

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}

    fn on_gave_up(&self, _attempts: u32, _error: &dyn std::fmt::Display) {}
}

/// Observer that logs through `tracing`
///
/// Failed attempts log at WARN, giving up at ERROR, success after a retry at
/// INFO and first-attempt success at DEBUG.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_failed(&self, attempt: u32, error: &dyn std::fmt::Display, delay: Duration) {
        tracing::warn!(
            operation = %self.operation,
            attempt = attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt = attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_gave_up(&self, attempts: u32, error: &dyn std::fmt::Display) {
        tracing::error!(
            operation = %self.operation,
            attempts = attempts,
            error = %error,
            "giving up"
        );
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_failed(&self, attempt: u32, error: &dyn std::fmt::Display, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_gave_up(&self, attempts: u32, error: &dyn std::fmt::Display) {
        (**self).on_gave_up(attempts, error)
    }
}
