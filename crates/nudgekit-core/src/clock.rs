//! Periodic-tick scheduling.
//!
//! The page pieces that need a cadence (countdown second-ticks, scarcity
//! decrements, scroll sampling) all register against one [`TickScheduler`]
//! instead of each owning a timer. The scheduler holds no thread and no
//! clock: the host calls [`TickScheduler::due`] with the current instant and
//! dispatches whatever tokens come back. Tests drive it with fabricated
//! instants.
//!
//! After a long gap (tab backgrounded, machine asleep) a due entry fires
//! once and is realigned to `now + period` -- there is no catch-up burst,
//! and nothing downstream may count ticks to measure time.

use chrono::{DateTime, Duration, Utc};

/// Opaque handle returned by [`TickScheduler::every`]. Keep it to cancel
/// the entry later; dropping it leaks nothing (the entry lives until
/// cancelled or cleared).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelHandle(u64);

#[derive(Debug)]
struct Entry<T> {
    id: u64,
    token: T,
    period: Duration,
    next_due: DateTime<Utc>,
}

/// Single-threaded periodic scheduler over an arbitrary token type.
#[derive(Debug)]
pub struct TickScheduler<T> {
    entries: Vec<Entry<T>>,
    next_id: u64,
}

impl<T: Copy> TickScheduler<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Register `token` to come due every `period`, first at `now + period`.
    pub fn every(&mut self, period: Duration, token: T, now: DateTime<Utc>) -> CancelHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            token,
            period,
            next_due: now + period,
        });
        CancelHandle(id)
    }

    /// Remove the entry behind `handle`. Unknown or already-cancelled
    /// handles are a no-op.
    pub fn cancel(&mut self, handle: CancelHandle) {
        self.entries.retain(|e| e.id != handle.0);
    }

    /// Replace the period of an existing entry, keeping its phase relative
    /// to `now`. Used when a cadence is reconfigured mid-page.
    pub fn reschedule(&mut self, handle: CancelHandle, period: Duration, now: DateTime<Utc>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == handle.0) {
            entry.period = period;
            entry.next_due = now + period;
        }
    }

    /// Collect every token whose deadline has passed, realigning each fired
    /// entry to `now + period`. Tokens come back in registration order.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<T> {
        let mut fired = Vec::new();
        for entry in &mut self.entries {
            if now >= entry.next_due {
                fired.push(entry.token);
                entry.next_due = now + entry.period;
            }
        }
        fired
    }

    /// Drop every entry. Called on page teardown so no cadence outlives
    /// the page.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T: Copy> Default for TickScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
