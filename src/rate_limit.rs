use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

// Providers publish their quotas per minute
pub const QUOTA_WINDOW: Duration = Duration::from_secs(60);

// Sliding-window quota for a single provider.
//
// `history` holds the instants of admitted calls, oldest first. A call in
// flight holds a reserved entry so that concurrent requests cannot both take
// the last free slot.
pub struct QuotaTracker {
    max_per_window: usize,
    window: Duration,
    history: Mutex<VecDeque<Instant>>,
}

impl QuotaTracker {
    pub fn new(max_per_window: usize) -> Self {
        Self::with_window(max_per_window, QUOTA_WINDOW)
    }

    pub fn with_window(max_per_window: usize, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            history: Mutex::new(VecDeque::with_capacity(max_per_window)),
        }
    }

    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    /// Evicts entries that fell out of the window, then reserves a slot if the
    /// provider is still under quota.
    ///
    /// The returned [`QuotaSlot`] must be committed once the upstream call
    /// succeeds; dropping it uncommitted gives the slot back.
    pub fn admit(&self) -> Option<QuotaSlot<'_>> {
        let now = Instant::now();
        let mut history = self.history.lock();

        evict_expired(&mut history, now, self.window);
        if history.len() >= self.max_per_window {
            return None;
        }

        insert_sorted(&mut history, now);
        Some(QuotaSlot {
            tracker: self,
            reserved_at: now,
            committed: false,
        })
    }

    // Entries currently counted against the quota, after eviction
    pub fn in_window(&self) -> usize {
        let mut history = self.history.lock();
        evict_expired(&mut history, Instant::now(), self.window);
        history.len()
    }

    fn record(&self, reserved_at: Instant) {
        let mut history = self.history.lock();
        remove_one(&mut history, reserved_at);
        insert_sorted(&mut history, Instant::now());
    }

    fn release(&self, reserved_at: Instant) {
        remove_one(&mut self.history.lock(), reserved_at);
    }
}

// A reserved place in a provider's window, held while the call is in flight
pub struct QuotaSlot<'a> {
    tracker: &'a QuotaTracker,
    reserved_at: Instant,
    committed: bool,
}

impl QuotaSlot<'_> {
    /// Records the successful call at the current instant.
    pub fn commit(mut self) {
        self.committed = true;
        self.tracker.record(self.reserved_at);
    }
}

impl Drop for QuotaSlot<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.tracker.release(self.reserved_at);
        }
    }
}

// history is sorted, so everything at or before the cutoff is a prefix
fn evict_expired(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    let Some(cutoff) = now.checked_sub(window) else {
        return;
    };
    let first_live = history.partition_point(|at| *at <= cutoff);
    history.drain(..first_live);
}

fn insert_sorted(history: &mut VecDeque<Instant>, at: Instant) {
    let idx = history.partition_point(|t| *t <= at);
    history.insert(idx, at);
}

// No-op when the entry already aged out of the window
fn remove_one(history: &mut VecDeque<Instant>, at: Instant) {
    let idx = history.partition_point(|t| *t < at);
    if history.get(idx) == Some(&at) {
        history.remove(idx);
    }
}
