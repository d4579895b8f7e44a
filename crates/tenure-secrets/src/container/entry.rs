//! Managed lease entries and the table that owns them

use super::queue::{Due, DueQueue};
use crate::event::SecretBody;
use crate::lease::Lease;
use crate::requested::RequestedSecret;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Identity of one registration; never reused within a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(super) struct EntryId(pub(super) u64);

/// Tracked state for one requested secret
#[derive(Debug)]
pub(super) struct ManagedLease {
    pub secret: RequestedSecret,
    pub lease: Lease,
    pub issued_at: Instant,
    pub body: SecretBody,
    /// Consecutive failed attempts since the last success
    pub failures: u32,
    /// Bumped on every reschedule
    pub generation: u64,
    /// No successful read yet; the next visit reads instead of renewing
    pub pending_read: bool,
}

impl ManagedLease {
    pub fn new(secret: RequestedSecret, lease: Lease, body: SecretBody, issued_at: Instant) -> Self {
        Self {
            secret,
            lease,
            issued_at,
            body,
            failures: 0,
            generation: 0,
            pending_read: false,
        }
    }

    /// Registration whose first read failed after the container started
    pub fn pending(secret: RequestedSecret, issued_at: Instant) -> Self {
        Self {
            failures: 1,
            pending_read: true,
            ..Self::new(secret, Lease::none(), SecretBody::default(), issued_at)
        }
    }

    /// Time left on the lease at `now`
    pub fn remaining(&self, now: Instant) -> Duration {
        (self.issued_at + self.lease.duration()).saturating_duration_since(now)
    }
}

/// All tracked entries plus the due-time queue
#[derive(Debug, Default)]
pub(super) struct EntryTable {
    entries: HashMap<EntryId, ManagedLease>,
    by_secret: HashMap<RequestedSecret, EntryId>,
    queue: DueQueue,
    next_id: u64,
}

impl EntryTable {
    pub fn insert(&mut self, entry: ManagedLease) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.by_secret.insert(entry.secret.clone(), id);
        self.entries.insert(id, entry);
        id
    }

    pub fn find(&self, secret: &RequestedSecret) -> Option<&ManagedLease> {
        self.by_secret.get(secret).and_then(|id| self.entries.get(id))
    }

    pub fn get(&self, id: EntryId) -> Option<&ManagedLease> {
        self.entries.get(&id)
    }

    /// Entry `id`, provided it has not been rescheduled since `generation`
    pub fn current_mut(&mut self, id: EntryId, generation: u64) -> Option<&mut ManagedLease> {
        self.entries
            .get_mut(&id)
            .filter(|entry| entry.generation == generation)
    }

    /// Queue entry `id` for a visit at `due_at`, superseding earlier schedules
    pub fn schedule(&mut self, id: EntryId, due_at: Instant) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.generation += 1;
            self.queue.push(id, entry.generation, due_at);
        }
    }

    pub fn remove(&mut self, id: EntryId) -> Option<ManagedLease> {
        let entry = self.entries.remove(&id)?;
        self.by_secret.remove(&entry.secret);
        Some(entry)
    }

    pub fn remove_secret(&mut self, secret: &RequestedSecret) -> Option<ManagedLease> {
        let id = *self.by_secret.get(secret)?;
        self.remove(id)
    }

    pub fn pop_due(&mut self, now: Instant, max_sleep: Duration) -> Due {
        let entries = &self.entries;
        self.queue.pop_due(now, max_sleep, |id, generation| {
            entries
                .get(&id)
                .is_some_and(|entry| entry.generation == generation)
        })
    }

    /// Remove everything, returning the entries that were tracked
    pub fn drain(&mut self) -> Vec<ManagedLease> {
        self.queue.clear();
        self.by_secret.clear();
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str) -> ManagedLease {
        ManagedLease::new(
            RequestedSecret::renewable(path),
            Lease::new("id", Duration::from_secs(30), true),
            SecretBody::default(),
            Instant::now(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_supersedes_previous_due_time() {
        let mut table = EntryTable::default();
        let now = Instant::now();
        let id = table.insert(entry("kv/app"));

        table.schedule(id, now);
        table.schedule(id, now + Duration::from_secs(5));

        assert_eq!(
            table.pop_due(now, Duration::from_secs(60)),
            Due::Wait(Duration::from_secs(5))
        );
        assert_eq!(
            table.pop_due(now + Duration::from_secs(5), Duration::from_secs(60)),
            Due::Ready(vec![id])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_entries_never_surface() {
        let mut table = EntryTable::default();
        let now = Instant::now();
        let id = table.insert(entry("kv/app"));
        table.schedule(id, now);

        let removed = table.remove_secret(&RequestedSecret::renewable("kv/app"));
        assert!(removed.is_some());
        assert_eq!(table.len(), 0);
        assert_eq!(
            table.pop_due(now, Duration::from_secs(60)),
            Due::Wait(Duration::from_secs(60))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_are_not_reused() {
        let mut table = EntryTable::default();
        let first = table.insert(entry("kv/app"));
        table.remove(first);
        let second = table.insert(entry("kv/app"));

        assert_ne!(first, second);
        assert!(table.get(first).is_none());
        assert!(table.find(&RequestedSecret::renewable("kv/app")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining() {
        let entry = entry("kv/app");
        let later = entry.issued_at + Duration::from_secs(24);
        assert_eq!(entry.remaining(later), Duration::from_secs(6));
        assert_eq!(
            entry.remaining(later + Duration::from_secs(60)),
            Duration::ZERO
        );
    }
}
