//! Records published lease events

use std::sync::{Arc, Mutex};
use tenure_secrets::{BackendError, SecretLeaseContainer, SecretLeaseEvent};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct LoggedEvent {
    pub event: SecretLeaseEvent,
    pub at: Instant,
}

#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<LoggedEvent>>,
}

impl EventLog {
    /// Attach a log to both channels of `container`
    pub fn attach(container: &SecretLeaseContainer) -> Arc<Self> {
        let log = Arc::new(Self::default());

        let lifecycle = log.clone();
        container.add_lease_listener(Arc::new(move |event: &SecretLeaseEvent| {
            lifecycle.push(event)
        }));

        let errors = log.clone();
        container.add_error_listener(Arc::new(
            move |event: &SecretLeaseEvent, _: &BackendError| errors.push(event),
        ));

        log
    }

    fn push(&self, event: &SecretLeaseEvent) {
        self.events.lock().unwrap().push(LoggedEvent {
            event: event.clone(),
            at: Instant::now(),
        });
    }

    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Event kind names in delivery order
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|logged| logged.event.kind().name())
            .collect()
    }

    pub fn first(&self, name: &str) -> Option<LoggedEvent> {
        self.events()
            .into_iter()
            .find(|logged| logged.event.kind().name() == name)
    }
}
