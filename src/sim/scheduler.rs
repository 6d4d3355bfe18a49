//! Deferred callback queue
//!
//! A min-heap keyed by fire time. Every entry carries the epoch it was
//! scheduled under; advancing the epoch turns everything already queued into
//! a no-op in one step. Stale entries are discarded when they come due.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

/// Cancellation token. Callbacks scheduled under an older epoch never fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

#[derive(Debug, Clone)]
struct Entry<T> {
    at: Duration,
    /// Insertion counter: equal fire times pop in scheduling order
    seq: u64,
    epoch: Epoch,
    payload: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then_with(|| self.seq.cmp(&other.seq))
    }
}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Timer queue driven by the simulation clock
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    epoch: Epoch,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            epoch: Epoch::default(),
            next_seq: 0,
        }
    }

    /// Current epoch, captured by everything scheduled now
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Invalidate every pending callback. Returns the new epoch.
    pub fn advance_epoch(&mut self) -> Epoch {
        self.epoch = Epoch(self.epoch.0 + 1);
        // Stale entries would be skipped anyway; dropping them frees memory now
        self.heap.clear();
        self.epoch
    }

    /// Queue `payload` to fire at `at` under the current epoch
    pub fn schedule(&mut self, at: Duration, payload: T) {
        let entry = Entry {
            at,
            seq: self.next_seq,
            epoch: self.epoch,
            payload,
        };
        self.next_seq += 1;
        self.heap.push(Reverse(entry));
    }

    /// Pop every callback due at or before `now`, in fire order, skipping
    /// stale epochs
    pub fn drain_due(&mut self, now: Duration) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.at > now {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                if entry.epoch == self.epoch {
                    due.push(entry.payload);
                } else {
                    log::trace!("dropping stale callback from epoch {}", entry.epoch.0);
                }
            }
        }
        due
    }

    /// Fire time of the next live callback
    pub fn next_due(&self) -> Option<Duration> {
        self.heap
            .iter()
            .filter(|Reverse(e)| e.epoch == self.epoch)
            .map(|Reverse(e)| e.at)
            .min()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
