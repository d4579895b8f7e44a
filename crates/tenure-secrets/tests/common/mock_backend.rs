//! Scripted in-memory secret backend
//!
//! Reads and renewals are answered from per-path scripts. Each script is a
//! queue whose last response repeats forever, so `[ok, err]` means "succeed
//! once, then keep failing". Unscripted renewals hand back the same lease.
//! Gates hold a call in flight: the renewal gate stays armed, the read and
//! revocation gates catch one call each.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tenure_secrets::{BackendError, Lease, SecretBackend, SecretResponse};
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Read(String),
    Renew(String),
    Revoke(String),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: Call,
    pub at: Instant,
}

/// Lets a test hold a backend call in flight
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

type Script<T> = VecDeque<Result<T, BackendError>>;

#[derive(Default)]
pub struct MockBackend {
    reads: Mutex<HashMap<String, Script<SecretResponse>>>,
    renewals: Mutex<HashMap<String, Script<Lease>>>,
    revoke_error: Mutex<Option<BackendError>>,
    calls: Mutex<Vec<RecordedCall>>,
    renew_gate: Mutex<Option<Arc<Gate>>>,
    read_gate: Mutex<Option<Arc<Gate>>>,
    revoke_gate: Mutex<Option<Arc<Gate>>>,
}

fn next<T: Clone>(script: Option<&mut Script<T>>) -> Option<Result<T, BackendError>> {
    let script = script?;
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_reads(
        &self,
        path: &str,
        responses: impl IntoIterator<Item = Result<SecretResponse, BackendError>>,
    ) {
        self.reads
            .lock()
            .unwrap()
            .insert(path.to_string(), responses.into_iter().collect());
    }

    pub fn script_renewals(
        &self,
        path: &str,
        responses: impl IntoIterator<Item = Result<Lease, BackendError>>,
    ) {
        self.renewals
            .lock()
            .unwrap()
            .insert(path.to_string(), responses.into_iter().collect());
    }

    pub fn fail_revocations(&self, error: BackendError) {
        *self.revoke_error.lock().unwrap() = Some(error);
    }

    /// Make the next renewals wait for `Gate::release`
    pub fn hold_renewals(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.renew_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Make the next read wait for `Gate::release`
    pub fn hold_next_read(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.read_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Make the next revocation wait for `Gate::release`
    pub fn hold_next_revocation(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.revoke_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        self.count(|call| matches!(call, Call::Read(_)))
    }

    pub fn renewals(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|recorded| matches!(recorded.call, Call::Renew(_)))
            .collect()
    }

    pub fn revocations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|recorded| match recorded.call {
                Call::Revoke(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|recorded| predicate(&recorded.call))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(RecordedCall {
            call,
            at: Instant::now(),
        });
    }
}

#[async_trait]
impl SecretBackend for MockBackend {
    async fn read(&self, path: &str) -> Result<SecretResponse, BackendError> {
        self.record(Call::Read(path.to_string()));
        let gate = self.read_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let scripted = next(self.reads.lock().unwrap().get_mut(path));
        scripted.unwrap_or_else(|| {
            Err(BackendError::NotFound {
                path: path.to_string(),
            })
        })
    }

    async fn renew(&self, lease: &Lease, path: &str) -> Result<Lease, BackendError> {
        self.record(Call::Renew(lease.id().to_string()));

        let gate = self.renew_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let scripted = next(self.renewals.lock().unwrap().get_mut(path));
        scripted.unwrap_or_else(|| Ok(lease.clone()))
    }

    async fn revoke(&self, lease_id: &str) -> Result<(), BackendError> {
        self.record(Call::Revoke(lease_id.to_string()));
        let gate = self.revoke_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        match self.revoke_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
