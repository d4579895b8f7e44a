//! Lease container
//!
//! [`SecretLeaseContainer`] tracks every requested secret, renews or rotates
//! leases before they run out, and publishes each state transition as a
//! [`SecretLeaseEvent`].
//!
//! # Scheduling
//!
//! One background task owns the sweep loop. It sleeps until the earliest
//! due-time (at most `max-sleep`), or until a registration wakes it, then
//! visits every due entry in turn. Backend I/O for those visits runs on the
//! sweep task, one entry at a time.
//!
//! | Mode     | Lease                  | Due at                    | Visit                      |
//! |----------|------------------------|---------------------------|----------------------------|
//! | any      | none / zero duration   | never scheduled           |                            |
//! | `once`   | with duration          | expiry                    | `Expired`, entry dropped   |
//! | `renew`  | non-renewable          | expiry                    | `Expired`, entry dropped   |
//! | `renew`  | renewable              | `renewal_delay(duration)` | renew; `Renewed`           |
//! | `rotate` | with duration          | `renewal_delay(duration)` | fresh read; `Rotated`      |
//!
//! A renewal the server rejects with "lease not found", and a renewable lease
//! that has already run out, fall back to a fresh read published as
//! `Created`. Any other failure publishes `Error` and retries after the
//! failure backoff; once `failure-backoff.max-attempts` consecutive attempts
//! have failed, `Expired` follows and the entry is dropped.
//!
//! # Concurrency
//!
//! Backend calls never hold a lock. Each transition is committed and
//! published under one async guard, so events for a secret are delivered in
//! the order their transitions happened. A visit whose entry was removed
//! while its backend call was in flight is discarded at commit time, and any
//! freshly issued lease it obtained is revoked.

mod entry;
mod queue;

use self::entry::{EntryId, EntryTable, ManagedLease};
use self::queue::Due;
use crate::backend::{BackendError, SecretBackend, SecretResponse};
use crate::error::ContainerError;
use crate::event::{LeaseEventKind, SecretBody, SecretLeaseEvent};
use crate::lease::Lease;
use crate::listener::{LeaseErrorListener, LeaseEventPublisher, LeaseListener, ListenerId};
use crate::requested::RequestedSecret;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tenure_core::retry::calculate_delay;
use tenure_core::types::{LeaseConfig, RenewalMode};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Created,
    Running,
    Stopped,
}

struct State {
    status: Status,
    table: EntryTable,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    backend: Arc<dyn SecretBackend>,
    config: LeaseConfig,
    state: Mutex<State>,
    wakeup: Notify,
    transition: tokio::sync::Mutex<()>,
    publisher: LeaseEventPublisher,
}

/// Keeps requested secrets and their leases alive
///
/// Cloning yields another handle to the same container. The sweep task holds
/// a handle of its own, so call [`stop`](Self::stop) to shut it down.
#[derive(Clone)]
pub struct SecretLeaseContainer {
    inner: Arc<Inner>,
}

/// What a visit to a due entry does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Expire,
    Renew,
    Read(ReadKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadKind {
    /// Scheduled rotation; published as `Rotated`
    Rotate,
    /// Initial read retried or a lost lease replaced; published as `Created`
    Recover,
}

/// Snapshot of an entry taken when it is visited
struct Visit {
    id: EntryId,
    generation: u64,
    secret: RequestedSecret,
    lease: Lease,
    action: Action,
}

enum Outcome {
    Renewed(Lease),
    Read(ReadKind, SecretResponse),
    Failed(BackendError),
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Leases without an id are only kept for rotation; elsewhere they mean a
/// static secret
fn normalize_lease(mode: RenewalMode, lease: Lease) -> Lease {
    if mode != RenewalMode::Rotate && !lease.is_revocable() {
        Lease::none()
    } else {
        lease
    }
}

impl SecretLeaseContainer {
    /// Create a stopped container; fails if `config` does not validate
    pub fn new(
        backend: Arc<dyn SecretBackend>,
        config: LeaseConfig,
    ) -> Result<Self, ContainerError> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                backend,
                config,
                state: Mutex::new(State {
                    status: Status::Created,
                    table: EntryTable::default(),
                    task: None,
                }),
                wakeup: Notify::new(),
                transition: tokio::sync::Mutex::new(()),
                publisher: LeaseEventPublisher::new(),
            }),
        })
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.inner.config
    }

    /// Start the sweep task on the current Tokio runtime
    ///
    /// Starting a running container does nothing. A stopped container cannot
    /// be restarted.
    pub fn start(&self) -> Result<(), ContainerError> {
        let mut state = lock(&self.inner.state);
        match state.status {
            Status::Running => return Ok(()),
            Status::Stopped => return Err(ContainerError::AlreadyStopped),
            Status::Created => {}
        }

        let handle = Handle::try_current().map_err(|_| ContainerError::NoRuntime)?;
        state.task = Some(handle.spawn(self.inner.clone().run()));
        state.status = Status::Running;

        info!(
            backend = self.inner.backend.name(),
            tracked = state.table.len(),
            "lease container started"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.state).status == Status::Running
    }

    /// Stop the sweep task and release every tracked lease
    ///
    /// Waits up to `shutdown-timeout` for an in-flight visit before aborting
    /// the task. With `revoke-on-shutdown`, every revocable lease is revoked
    /// and `BeforeRevocation`/`AfterRevocation` are published for it. Safe to
    /// call on a container that was never started, and more than once.
    pub async fn stop(&self) {
        let task = {
            let mut state = lock(&self.inner.state);
            if state.status == Status::Stopped {
                return;
            }
            state.status = Status::Stopped;
            state.task.take()
        };
        self.inner.wakeup.notify_one();

        if let Some(mut task) = task {
            let grace = self.inner.config.shutdown_timeout();
            if timeout(grace, &mut task).await.is_err() {
                warn!(
                    timeout_ms = grace.as_millis() as u64,
                    "sweep task did not finish in time, aborting"
                );
                task.abort();
            }
        }

        let _guard = self.inner.transition.lock().await;
        let entries = lock(&self.inner.state).table.drain();
        let released = entries.len();

        if self.inner.config.revoke_on_shutdown {
            for entry in entries {
                if !entry.lease.is_revocable() {
                    continue;
                }
                self.inner.publish(SecretLeaseEvent::new(
                    entry.secret.clone(),
                    entry.lease.clone(),
                    LeaseEventKind::BeforeRevocation,
                ));
                self.inner.revoke_quietly(&entry.secret, &entry.lease).await;
                self.inner.publish(SecretLeaseEvent::new(
                    entry.secret,
                    entry.lease,
                    LeaseEventKind::AfterRevocation,
                ));
            }
        }

        info!(released, "lease container stopped");
    }

    /// Register a secret and perform its first read
    ///
    /// Returns the current lease without a backend call when the secret is
    /// already tracked. A missing secret publishes `NotFound` and returns
    /// [`Lease::None`] without tracking it. Other read failures publish
    /// `Error`; before [`start`](Self::start) they are returned to the
    /// caller, afterwards the secret stays tracked and the read is retried
    /// under the failure budget.
    pub async fn add_requested_secret(
        &self,
        secret: RequestedSecret,
    ) -> Result<Lease, ContainerError> {
        {
            let state = lock(&self.inner.state);
            if state.status == Status::Stopped {
                return Err(ContainerError::AlreadyStopped);
            }
            if let Some(entry) = state.table.find(&secret) {
                debug!(secret = %secret, "secret already registered");
                return Ok(entry.lease.clone());
            }
        }

        let result = self.inner.backend.read(secret.path()).await;

        let guard = self.inner.transition.lock().await;
        let (status, existing) = {
            let state = lock(&self.inner.state);
            let existing = state.table.find(&secret).map(|entry| entry.lease.clone());
            (state.status, existing)
        };

        // Stopped or registered concurrently while the read was in flight
        if status == Status::Stopped || existing.is_some() {
            drop(guard);
            if let Ok(response) = &result {
                let fresh = normalize_lease(secret.mode(), response.lease.clone());
                self.inner.revoke_quietly(&secret, &fresh).await;
            }
            return existing.ok_or(ContainerError::AlreadyStopped);
        }

        match result {
            Ok(response) => {
                let lease = normalize_lease(secret.mode(), response.lease);
                let now = Instant::now();
                {
                    let mut state = lock(&self.inner.state);
                    let id = state.table.insert(ManagedLease::new(
                        secret.clone(),
                        lease.clone(),
                        response.data.clone(),
                        now,
                    ));
                    if let Some(delay) = self.inner.schedule_delay(secret.mode(), &lease) {
                        state.table.schedule(id, now + delay);
                    }
                }
                self.inner.wakeup.notify_one();

                info!(secret = %secret, lease = %lease, "secret registered");
                self.inner.publish(SecretLeaseEvent::created(
                    secret,
                    lease.clone(),
                    response.data,
                ));
                Ok(lease)
            }
            Err(err) if err.is_not_found() => {
                info!(secret = %secret, "secret not found");
                self.inner.publish(SecretLeaseEvent::new(
                    secret,
                    Lease::none(),
                    LeaseEventKind::NotFound,
                ));
                Ok(Lease::none())
            }
            Err(err) => {
                self.inner.publish(SecretLeaseEvent::error(
                    secret.clone(),
                    Lease::none(),
                    err.clone(),
                ));

                if status != Status::Running {
                    return Err(err.into());
                }

                if self.inner.config.max_renewal_failures() <= 1 {
                    warn!(secret = %secret, error = %err, "initial read failed, not retrying");
                    return Ok(Lease::none());
                }

                let now = Instant::now();
                let delay = calculate_delay(&self.inner.config.failure_backoff, 1, false);
                {
                    let mut state = lock(&self.inner.state);
                    let id = state.table.insert(ManagedLease::pending(secret.clone(), now));
                    state.table.schedule(id, now + delay);
                }
                self.inner.wakeup.notify_one();

                warn!(
                    secret = %secret,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "initial read failed, will retry"
                );
                Ok(Lease::none())
            }
        }
    }

    /// Register `path` in [`RenewalMode::Renew`]
    pub async fn request_renewable_secret(
        &self,
        path: impl Into<String>,
    ) -> Result<RequestedSecret, ContainerError> {
        let secret = RequestedSecret::renewable(path);
        self.add_requested_secret(secret.clone()).await?;
        Ok(secret)
    }

    /// Register `path` in [`RenewalMode::Rotate`]
    pub async fn request_rotating_secret(
        &self,
        path: impl Into<String>,
    ) -> Result<RequestedSecret, ContainerError> {
        let secret = RequestedSecret::rotating(path);
        self.add_requested_secret(secret.clone()).await?;
        Ok(secret)
    }

    /// Stop tracking `secret`
    ///
    /// Publishes `BeforeRevocation`, revokes the lease when `revoke-on-remove`
    /// is set (failures are logged), then publishes `AfterRevocation`.
    /// Returns whether the secret was tracked.
    ///
    /// Other transitions wait until `AfterRevocation` is published, so a
    /// re-registration of the same secret is reported after it.
    pub async fn remove_lease_for_secret(&self, secret: &RequestedSecret) -> bool {
        let _guard = self.inner.transition.lock().await;
        let Some(entry) = lock(&self.inner.state).table.remove_secret(secret) else {
            return false;
        };

        self.inner.publish(SecretLeaseEvent::new(
            entry.secret.clone(),
            entry.lease.clone(),
            LeaseEventKind::BeforeRevocation,
        ));

        if self.inner.config.revoke_on_remove {
            self.inner.revoke_quietly(&entry.secret, &entry.lease).await;
        }

        debug!(secret = %entry.secret, "secret removed");
        self.inner.publish(SecretLeaseEvent::new(
            entry.secret,
            entry.lease,
            LeaseEventKind::AfterRevocation,
        ));
        true
    }

    /// Current lease for a tracked secret
    pub fn lease(&self, secret: &RequestedSecret) -> Option<Lease> {
        lock(&self.inner.state)
            .table
            .find(secret)
            .map(|entry| entry.lease.clone())
    }

    /// Last secret body read for a tracked secret
    pub fn secret_data(&self, secret: &RequestedSecret) -> Option<SecretBody> {
        lock(&self.inner.state)
            .table
            .find(secret)
            .filter(|entry| !entry.pending_read)
            .map(|entry| entry.body.clone())
    }

    pub fn is_tracked(&self, secret: &RequestedSecret) -> bool {
        lock(&self.inner.state).table.find(secret).is_some()
    }

    pub fn add_lease_listener(&self, listener: Arc<dyn LeaseListener>) -> ListenerId {
        self.inner.publisher.add_lease_listener(listener)
    }

    pub fn remove_lease_listener(&self, id: ListenerId) -> bool {
        self.inner.publisher.remove_lease_listener(id)
    }

    pub fn add_error_listener(&self, listener: Arc<dyn LeaseErrorListener>) -> ListenerId {
        self.inner.publisher.add_error_listener(listener)
    }

    pub fn remove_error_listener(&self, id: ListenerId) -> bool {
        self.inner.publisher.remove_error_listener(id)
    }
}

impl Inner {
    fn publish(&self, event: SecretLeaseEvent) {
        debug!(secret = %event.secret(), event = event.kind().name(), "publishing lease event");
        self.publisher.publish(&event);
    }

    /// Delay from issuance until the entry's next visit; `None` when the
    /// lease needs no visit
    fn schedule_delay(&self, mode: RenewalMode, lease: &Lease) -> Option<Duration> {
        let duration = lease.duration();
        if lease.is_none() || duration.is_zero() {
            return None;
        }

        match mode {
            RenewalMode::Once => Some(duration),
            RenewalMode::Renew if !lease.is_renewable() => Some(duration),
            RenewalMode::Renew | RenewalMode::Rotate => Some(self.config.renewal_delay(duration)),
        }
    }

    async fn revoke_quietly(&self, secret: &RequestedSecret, lease: &Lease) {
        if !lease.is_revocable() {
            return;
        }

        match self.backend.revoke(lease.id()).await {
            Ok(()) => debug!(secret = %secret, lease_id = %lease.id(), "lease revoked"),
            Err(err) => warn!(
                secret = %secret,
                lease_id = %lease.id(),
                error = %err,
                "failed to revoke lease"
            ),
        }
    }

    async fn run(self: Arc<Self>) {
        debug!("sweep loop running");

        loop {
            let due = {
                let mut state = lock(&self.state);
                if state.status == Status::Stopped {
                    break;
                }
                state.table.pop_due(Instant::now(), self.config.max_sleep())
            };

            match due {
                Due::Ready(ids) => {
                    for id in ids {
                        if lock(&self.state).status == Status::Stopped {
                            break;
                        }
                        self.visit(id).await;
                    }
                }
                Due::Wait(wait) => {
                    tokio::select! {
                        _ = sleep(wait) => {}
                        _ = self.wakeup.notified() => {}
                    }
                }
            }
        }

        debug!("sweep loop exited");
    }

    fn plan(&self, entry: &ManagedLease, now: Instant) -> Action {
        if entry.pending_read {
            return Action::Read(ReadKind::Recover);
        }

        match entry.secret.mode() {
            RenewalMode::Once => Action::Expire,
            RenewalMode::Rotate => Action::Read(ReadKind::Rotate),
            RenewalMode::Renew if !entry.lease.is_renewable() => Action::Expire,
            RenewalMode::Renew if entry.remaining(now) < self.config.expiry_threshold() => {
                Action::Read(ReadKind::Recover)
            }
            RenewalMode::Renew => Action::Renew,
        }
    }

    async fn visit(&self, id: EntryId) {
        let visit = {
            let state = lock(&self.state);
            let Some(entry) = state.table.get(id) else {
                return;
            };
            Visit {
                id,
                generation: entry.generation,
                secret: entry.secret.clone(),
                lease: entry.lease.clone(),
                action: self.plan(entry, Instant::now()),
            }
        };

        debug!(secret = %visit.secret, action = ?visit.action, "visiting due lease");

        let outcome = match visit.action {
            Action::Expire => {
                self.expire(&visit).await;
                return;
            }
            Action::Renew => match self.backend.renew(&visit.lease, visit.secret.path()).await {
                Ok(lease) => Outcome::Renewed(lease),
                Err(err) if err.is_lease_not_found() => {
                    info!(
                        secret = %visit.secret,
                        lease = %visit.lease,
                        "lease lost, re-reading secret"
                    );
                    self.read(&visit, ReadKind::Recover).await
                }
                Err(err) => Outcome::Failed(err),
            },
            Action::Read(kind) => self.read(&visit, kind).await,
        };

        self.commit(visit, outcome).await;
    }

    async fn read(&self, visit: &Visit, kind: ReadKind) -> Outcome {
        match self.backend.read(visit.secret.path()).await {
            Ok(response) => Outcome::Read(kind, response),
            Err(err) => Outcome::Failed(err),
        }
    }

    async fn expire(&self, visit: &Visit) {
        let _guard = self.transition.lock().await;
        let removed = {
            let mut state = lock(&self.state);
            if state.table.current_mut(visit.id, visit.generation).is_none() {
                return;
            }
            state.table.remove(visit.id)
        };

        if let Some(entry) = removed {
            info!(secret = %entry.secret, lease = %entry.lease, "lease expired");
            self.publish(SecretLeaseEvent::new(
                entry.secret,
                entry.lease,
                LeaseEventKind::Expired,
            ));
        }
    }

    async fn commit(&self, visit: Visit, outcome: Outcome) {
        let guard = self.transition.lock().await;
        let live = lock(&self.state)
            .table
            .current_mut(visit.id, visit.generation)
            .is_some();

        if !live {
            drop(guard);
            debug!(secret = %visit.secret, "entry removed during visit, discarding result");
            if let Outcome::Read(_, response) = outcome {
                let fresh = normalize_lease(visit.secret.mode(), response.lease);
                self.revoke_quietly(&visit.secret, &fresh).await;
            }
            return;
        }

        for event in self.apply(visit, outcome) {
            self.publish(event);
        }
    }

    /// Record the outcome of a visit; returns the events to publish
    fn apply(&self, visit: Visit, outcome: Outcome) -> Vec<SecretLeaseEvent> {
        let now = Instant::now();
        let mode = visit.secret.mode();
        let mut state = lock(&self.state);
        let Some(entry) = state.table.current_mut(visit.id, visit.generation) else {
            return Vec::new();
        };

        match outcome {
            Outcome::Renewed(lease) => {
                entry.lease = lease.clone();
                entry.issued_at = now;
                entry.failures = 0;
                if let Some(delay) = self.schedule_delay(mode, &lease) {
                    state.table.schedule(visit.id, now + delay);
                }

                info!(secret = %visit.secret, lease = %lease, "lease renewed");
                vec![SecretLeaseEvent::new(
                    visit.secret,
                    lease,
                    LeaseEventKind::Renewed,
                )]
            }
            Outcome::Read(kind, response) => {
                let lease = normalize_lease(mode, response.lease);
                let previous = std::mem::replace(&mut entry.lease, lease.clone());
                let recovered = entry.pending_read || kind == ReadKind::Recover;
                entry.body = response.data.clone();
                entry.issued_at = now;
                entry.failures = 0;
                entry.pending_read = false;
                if let Some(delay) = self.schedule_delay(mode, &lease) {
                    state.table.schedule(visit.id, now + delay);
                }

                if recovered {
                    info!(secret = %visit.secret, lease = %lease, "secret re-read");
                    vec![SecretLeaseEvent::created(visit.secret, lease, response.data)]
                } else {
                    info!(secret = %visit.secret, lease = %lease, "secret rotated");
                    vec![SecretLeaseEvent::rotated(
                        visit.secret,
                        previous,
                        lease,
                        response.data,
                    )]
                }
            }
            Outcome::Failed(err) => {
                entry.failures += 1;
                let failures = entry.failures;
                let lease = entry.lease.clone();
                let budget = self.config.max_renewal_failures();
                let mut events = vec![SecretLeaseEvent::error(
                    visit.secret.clone(),
                    lease.clone(),
                    err.clone(),
                )];

                if failures >= budget {
                    state.table.remove(visit.id);
                    error!(
                        secret = %visit.secret,
                        failures,
                        error = %err,
                        "failure budget exhausted, expiring lease"
                    );
                    events.push(SecretLeaseEvent::new(
                        visit.secret,
                        lease,
                        LeaseEventKind::Expired,
                    ));
                } else {
                    let delay = calculate_delay(&self.config.failure_backoff, failures, false);
                    state.table.schedule(visit.id, now + delay);
                    warn!(
                        secret = %visit.secret,
                        failures,
                        budget,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "lease visit failed"
                    );
                }
                events
            }
        }
    }
}
