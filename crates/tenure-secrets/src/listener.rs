//! Lease event listeners and fan-out
//!
//! Listeners are invoked synchronously, in registration order, on whichever
//! task produced the event. Each call is isolated: a panicking listener is
//! logged and skipped, and delivery continues with the next one. Delivery
//! iterates over a snapshot, so listeners may register or remove listeners
//! (including themselves) from inside a callback.

use crate::backend::BackendError;
use crate::event::SecretLeaseEvent;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::error;

/// Receives lifecycle events (everything except errors)
pub trait LeaseListener: Send + Sync {
    fn on_lease_event(&self, event: &SecretLeaseEvent);
}

/// Receives error events
pub trait LeaseErrorListener: Send + Sync {
    fn on_lease_error(&self, event: &SecretLeaseEvent, error: &BackendError);
}

impl<F> LeaseListener for F
where
    F: Fn(&SecretLeaseEvent) + Send + Sync,
{
    fn on_lease_event(&self, event: &SecretLeaseEvent) {
        self(event)
    }
}

impl<F> LeaseErrorListener for F
where
    F: Fn(&SecretLeaseEvent, &BackendError) + Send + Sync,
{
    fn on_lease_error(&self, event: &SecretLeaseEvent, error: &BackendError) {
        self(event, error)
    }
}

/// Handle returned on registration, used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Registry<L> = RwLock<Vec<(ListenerId, Arc<L>)>>;

/// Registry of listeners and the fan-out for events
#[derive(Default)]
pub struct LeaseEventPublisher {
    next_id: AtomicU64,
    listeners: Registry<dyn LeaseListener>,
    error_listeners: Registry<dyn LeaseErrorListener>,
}

impl LeaseEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_lease_listener(&self, listener: Arc<dyn LeaseListener>) -> ListenerId {
        let id = self.next_id();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Returns whether a listener was removed
    pub fn remove_lease_listener(&self, id: ListenerId) -> bool {
        remove(&self.listeners, id)
    }

    pub fn add_error_listener(&self, listener: Arc<dyn LeaseErrorListener>) -> ListenerId {
        let id = self.next_id();
        self.error_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Returns whether a listener was removed
    pub fn remove_error_listener(&self, id: ListenerId) -> bool {
        remove(&self.error_listeners, id)
    }

    /// Registered listeners across both channels
    pub fn listener_count(&self) -> usize {
        let lease = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let error = self
            .error_listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        lease + error
    }

    /// Deliver `event` to the error listeners if it carries an error, to the
    /// lease listeners otherwise
    pub fn publish(&self, event: &SecretLeaseEvent) {
        match event.backend_error() {
            Some(err) => {
                for listener in snapshot(&self.error_listeners) {
                    let outcome =
                        catch_unwind(AssertUnwindSafe(|| listener.on_lease_error(event, err)));
                    if outcome.is_err() {
                        error!(
                            secret = %event.secret(),
                            event = event.kind().name(),
                            "lease error listener panicked"
                        );
                    }
                }
            }
            None => {
                for listener in snapshot(&self.listeners) {
                    let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_lease_event(event)));
                    if outcome.is_err() {
                        error!(
                            secret = %event.secret(),
                            event = event.kind().name(),
                            "lease listener panicked"
                        );
                    }
                }
            }
        }
    }
}

fn snapshot<L: ?Sized>(registry: &Registry<L>) -> Vec<Arc<L>> {
    registry
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|(_, listener)| listener.clone())
        .collect()
}

fn remove<L: ?Sized>(registry: &Registry<L>, id: ListenerId) -> bool {
    let mut listeners = registry.write().unwrap_or_else(PoisonError::into_inner);
    let before = listeners.len();
    listeners.retain(|(existing, _)| *existing != id);
    listeners.len() != before
}
