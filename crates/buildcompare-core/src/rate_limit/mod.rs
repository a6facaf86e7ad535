//! Inbound admission control keyed by (policy, caller identity).
//!
//! Each policy is a fixed-window counter: the first request for a key opens a
//! window of `policy.window`, every later request in that window increments
//! the counter, and requests beyond `policy.max_requests` are denied until the
//! window has passed. Windows are not sliding.
//!
//! ```rust,ignore
//! use buildcompare_core::{PolicyName, RateLimiter};
//!
//! let limiter = RateLimiter::default();
//! let decision = limiter.check("203.0.113.7", PolicyName::Scraping);
//! if !decision.allowed {
//!     // respond 429 with decision.headers()
//! }
//! ```

mod clock;
mod policy;
mod store;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

pub use clock::{Clock, ManualClock, SystemClock};
pub use policy::{PolicyName, PolicyTable, RateLimitPolicy};
pub use store::{CounterStore, InMemoryCounterStore, RateLimitCounter};

/// How often expired counters are swept.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub window_reset_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl RateLimitDecision {
    fn from_counter(policy: &RateLimitPolicy, counter: RateLimitCounter, now_ms: u64) -> Self {
        if counter.count > policy.max_requests {
            return Self {
                allowed: false,
                limit: policy.max_requests,
                remaining: 0,
                window_reset_at_ms: counter.window_reset_at_ms,
                retry_after_ms: Some(counter.window_reset_at_ms.saturating_sub(now_ms)),
            };
        }

        Self {
            allowed: true,
            limit: policy.max_requests,
            remaining: policy.max_requests - counter.count,
            window_reset_at_ms: counter.window_reset_at_ms,
            retry_after_ms: None,
        }
    }

    /// Window reset as unix seconds, rounded up.
    pub const fn reset_unix_secs(&self) -> u64 {
        self.window_reset_at_ms.div_ceil(1_000)
    }

    /// Seconds to wait before retrying, rounded up. Only set on denial.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after_ms.map(|millis| millis.div_ceil(1_000))
    }

    /// Response headers describing this decision.
    ///
    /// Denied decisions also carry `Retry-After`.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, self.reset_unix_secs().to_string()),
        ];
        if !self.allowed {
            let retry_after = self.retry_after_secs().unwrap_or(0);
            headers.push((HEADER_RETRY_AFTER, retry_after.to_string()));
        }
        headers
    }
}

/// Fixed-window rate limiter over an injected counter store and clock.
pub struct RateLimiter {
    policies: PolicyTable,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(PolicyTable::default())
    }
}

impl RateLimiter {
    /// In-memory store on the system clock.
    pub fn new(policies: PolicyTable) -> Self {
        Self::with_store(
            policies,
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_store(
        policies: PolicyTable,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policies,
            store,
            clock,
        }
    }

    pub fn policy(&self, name: PolicyName) -> &RateLimitPolicy {
        self.policies.get(name)
    }

    /// Records a request from `identity` and decides whether it is admitted.
    ///
    /// The identity is an opaque key; any string is accepted.
    pub fn check(&self, identity: &str, policy: PolicyName) -> RateLimitDecision {
        let policy = self.policies.get(policy);
        let key = format!("{}:{identity}", policy.name);
        let now_ms = self.clock.now_ms();
        let counter = self.store.hit(&key, policy.window_ms(), now_ms);
        let decision = RateLimitDecision::from_counter(policy, counter, now_ms);

        if !decision.allowed {
            tracing::debug!(
                policy = %policy.name,
                identity,
                retry_after_ms = decision.retry_after_ms,
                "rate limit exceeded"
            );
        }

        decision
    }

    /// Drops counters whose window has passed.
    pub fn sweep(&self) -> usize {
        let removed = self.store.sweep(self.clock.now_ms());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.store.len(), "swept expired rate limit counters");
        }
        removed
    }

    /// Runs [`sweep`](Self::sweep) every `period` until the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.sweep();
            }
        })
    }
}
