use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Per (policy, identity) window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitCounter {
    pub count: u32,
    pub window_reset_at_ms: u64,
}

impl RateLimitCounter {
    fn fresh(window_ms: u64, now_ms: u64) -> Self {
        Self {
            count: 1,
            window_reset_at_ms: now_ms.saturating_add(window_ms),
        }
    }

    pub const fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.window_reset_at_ms
    }
}

/// Storage behind the rate limiter.
///
/// `hit` must be atomic with respect to other `hit` calls on the same key:
/// reading the counter, starting a new window and incrementing happen as one
/// step, so concurrent requests for one identity cannot lose updates.
pub trait CounterStore: Send + Sync {
    /// Records one request against `key` and returns the counter after it.
    fn hit(&self, key: &str, window_ms: u64, now_ms: u64) -> RateLimitCounter;

    /// Removes every counter whose window has passed. Returns how many were removed.
    fn sweep(&self, now_ms: u64) -> usize;

    /// Number of live counters.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local counter store guarded by a single mutex.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, RateLimitCounter>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> std::sync::MutexGuard<'_, HashMap<String, RateLimitCounter>> {
        // A panic while holding the lock cannot leave a counter half-written.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CounterStore for InMemoryCounterStore {
    fn hit(&self, key: &str, window_ms: u64, now_ms: u64) -> RateLimitCounter {
        let mut counters = self.counters();
        match counters.get_mut(key) {
            Some(counter) if !counter.is_expired(now_ms) => {
                counter.count = counter.count.saturating_add(1);
                *counter
            }
            Some(counter) => {
                *counter = RateLimitCounter::fresh(window_ms, now_ms);
                *counter
            }
            None => {
                let counter = RateLimitCounter::fresh(window_ms, now_ms);
                counters.insert(key.to_owned(), counter);
                counter
            }
        }
    }

    fn sweep(&self, now_ms: u64) -> usize {
        let mut counters = self.counters();
        let before = counters.len();
        counters.retain(|_, counter| !counter.is_expired(now_ms));
        before - counters.len()
    }

    fn len(&self) -> usize {
        self.counters().len()
    }
}
