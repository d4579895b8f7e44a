//! Due-time queue
//!
//! Min-heap of `(due_at, entry, generation)`. Rescheduling pushes a new item
//! with a bumped generation instead of searching the heap; items whose
//! generation no longer matches the entry are skipped when they surface.

use super::entry::EntryId;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Scheduled {
    due_at: Instant,
    entry: EntryId,
    generation: u64,
}

/// What the sweep should do next
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Due {
    /// Entries whose due-time has passed, earliest first
    Ready(Vec<EntryId>),
    /// Nothing is due; sleep this long
    Wait(Duration),
}

#[derive(Debug, Default)]
pub(super) struct DueQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
}

impl DueQueue {
    pub fn push(&mut self, entry: EntryId, generation: u64, due_at: Instant) {
        self.heap.push(Reverse(Scheduled {
            due_at,
            entry,
            generation,
        }));
    }

    /// Pop every live item due at `now`
    ///
    /// `is_live` reports whether an `(entry, generation)` pair is still
    /// current. When nothing is due, the wait until the earliest live item is
    /// returned, bounded by `max_sleep`.
    pub fn pop_due(
        &mut self,
        now: Instant,
        max_sleep: Duration,
        is_live: impl Fn(EntryId, u64) -> bool,
    ) -> Due {
        let mut ready = Vec::new();

        while let Some(Reverse(top)) = self.heap.peek().copied() {
            if !is_live(top.entry, top.generation) {
                self.heap.pop();
                continue;
            }
            if top.due_at > now {
                break;
            }
            self.heap.pop();
            ready.push(top.entry);
        }

        if !ready.is_empty() {
            return Due::Ready(ready);
        }

        match self.heap.peek() {
            Some(Reverse(next)) => {
                Due::Wait(next.due_at.saturating_duration_since(now).min(max_sleep))
            }
            None => Due::Wait(max_sleep),
        }
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_SLEEP: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_pops_in_due_order() {
        let now = Instant::now();
        let mut queue = DueQueue::default();
        queue.push(EntryId(2), 0, now + Duration::from_secs(2));
        queue.push(EntryId(1), 0, now + Duration::from_secs(1));
        queue.push(EntryId(3), 0, now + Duration::from_secs(10));

        let due = queue.pop_due(now + Duration::from_secs(5), MAX_SLEEP, |_, _| true);
        assert_eq!(due, Due::Ready(vec![EntryId(1), EntryId(2)]));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_next_item() {
        let now = Instant::now();
        let mut queue = DueQueue::default();
        queue.push(EntryId(1), 0, now + Duration::from_secs(7));

        assert_eq!(
            queue.pop_due(now, MAX_SLEEP, |_, _| true),
            Due::Wait(Duration::from_secs(7))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_bounded_by_max_sleep() {
        let now = Instant::now();
        let mut queue = DueQueue::default();
        assert_eq!(queue.pop_due(now, MAX_SLEEP, |_, _| true), Due::Wait(MAX_SLEEP));

        queue.push(EntryId(1), 0, now + Duration::from_secs(600));
        assert_eq!(queue.pop_due(now, MAX_SLEEP, |_, _| true), Due::Wait(MAX_SLEEP));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generations_are_dropped() {
        let now = Instant::now();
        let mut queue = DueQueue::default();
        queue.push(EntryId(1), 0, now);
        queue.push(EntryId(1), 1, now + Duration::from_secs(3));

        // Generation 0 was superseded by the reschedule
        let due = queue.pop_due(now, MAX_SLEEP, |_, generation| generation == 1);
        assert_eq!(due, Due::Wait(Duration::from_secs(3)));
        assert_eq!(queue.len(), 1);
    }
}
