//! Behavior-driven tests for inbound rate limiting
//!
//! These tests verify WHAT callers observe when they hit the dispatch core
//! repeatedly: admission, remaining budget, window resets and isolation
//! between policies.

use buildcompare_core::rate_limit::{CounterStore, InMemoryCounterStore};
use buildcompare_core::{ManualClock, PolicyName, PolicyTable, RateLimitPolicy, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

const START_MS: u64 = 1_700_000_000_000;

fn limiter() -> (Arc<RateLimiter>, Arc<ManualClock>, Arc<InMemoryCounterStore>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let store = Arc::new(InMemoryCounterStore::new());
    let limiter = RateLimiter::with_store(PolicyTable::default(), store.clone(), clock.clone());
    (Arc::new(limiter), clock, store)
}

// =============================================================================
// Rate Limiting: Admission
// =============================================================================

#[test]
fn when_fresh_caller_sends_101_requests_system_admits_exactly_100() {
    // Given: A caller the limiter has never seen
    let (limiter, _, _) = limiter();

    // When: The caller sends 100 requests under the default policy
    let mut previous_remaining = None;
    for request in 1..=100u32 {
        let decision = limiter.check("198.51.100.4", PolicyName::Default);

        // Then: Every request is admitted with a strictly decreasing budget
        assert!(decision.allowed, "request {request} should be admitted");
        assert_eq!(decision.remaining, 100 - request);
        if let Some(previous) = previous_remaining {
            assert!(decision.remaining < previous);
        }
        previous_remaining = Some(decision.remaining);
    }

    // And: The 101st request is denied with a retry hint
    let denied = limiter.check("198.51.100.4", PolicyName::Default);
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 0);
    assert!(denied.retry_after_ms.expect("retry hint on denial") > 0);
}

#[test]
fn when_window_passes_system_starts_a_new_count() {
    // Given: A caller who exhausted the scraping policy
    let (limiter, clock, _) = limiter();
    let mut last = limiter.check("203.0.113.9", PolicyName::Scraping);
    for _ in 0..10 {
        last = limiter.check("203.0.113.9", PolicyName::Scraping);
    }
    assert!(!last.allowed);

    // When: Simulated time moves past the window reset
    clock.set(last.window_reset_at_ms + 1);
    let decision = limiter.check("203.0.113.9", PolicyName::Scraping);

    // Then: The count restarts at one
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 9);
    assert!(decision.window_reset_at_ms > last.window_reset_at_ms);
}

#[test]
fn when_scraping_is_exhausted_system_keeps_default_budget_intact() {
    // Given: A caller who spent the whole scraping budget
    let (limiter, _, _) = limiter();
    for _ in 0..11 {
        limiter.check("192.0.2.10", PolicyName::Scraping);
    }
    assert!(!limiter.check("192.0.2.10", PolicyName::Scraping).allowed);

    // When: The same caller makes a general API request
    let decision = limiter.check("192.0.2.10", PolicyName::Default);

    // Then: The default policy counter is untouched
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 99);
}

#[test]
fn when_callers_differ_system_counts_them_separately() {
    // Given: Two callers sharing one limiter with a tight auth policy
    let clock = Arc::new(ManualClock::new(START_MS));
    let table = PolicyTable::default().with_policy(RateLimitPolicy::new(
        PolicyName::Auth,
        Duration::from_secs(60),
        1,
    ));
    let limiter = RateLimiter::with_store(table, Arc::new(InMemoryCounterStore::new()), clock);

    // When: Each caller makes one request
    let first = limiter.check("10.0.0.1", PolicyName::Auth);
    let second = limiter.check("10.0.0.2", PolicyName::Auth);

    // Then: Neither is affected by the other
    assert!(first.allowed);
    assert!(second.allowed);
    assert!(!limiter.check("10.0.0.1", PolicyName::Auth).allowed);
}

#[test]
fn when_denied_system_reports_reset_headers() {
    // Given: A caller over the auth budget
    let (limiter, _, _) = limiter();
    for _ in 0..5 {
        limiter.check("10.1.1.1", PolicyName::Auth);
    }

    // When: One more request arrives
    let denied = limiter.check("10.1.1.1", PolicyName::Auth);
    let headers = denied.headers();

    // Then: Limit, remaining, reset and retry-after are all present
    let names: Vec<&str> = headers.iter().map(|(name, _)| *name).collect();
    assert_eq!(
        names,
        vec!["X-RateLimit-Limit", "X-RateLimit-Remaining", "X-RateLimit-Reset", "Retry-After"]
    );
    assert_eq!(headers[0].1, "5");
    assert_eq!(headers[1].1, "0");
    assert_eq!(headers[3].1, "900");
}

// =============================================================================
// Rate Limiting: Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn when_many_tasks_race_for_one_identity_system_admits_exactly_max() {
    // Given: One limiter shared across tasks
    let (limiter, _, _) = limiter();

    // When: 64 tasks each fire 5 scraping checks for the same caller
    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                (0..5)
                    .filter(|_| limiter.check("203.0.113.50", PolicyName::Scraping).allowed)
                    .count()
            })
        })
        .collect();

    let mut admitted = 0;
    for task in tasks {
        admitted += task.await.expect("task completes");
    }

    // Then: No update is lost and exactly the policy maximum got through
    assert_eq!(admitted, 10);
}

// =============================================================================
// Rate Limiting: Housekeeping
// =============================================================================

#[test]
fn when_sweep_runs_system_removes_only_expired_counters() {
    // Given: One counter opened long ago and one opened just now
    let (limiter, clock, store) = limiter();
    limiter.check("old-caller", PolicyName::Scraping);
    clock.advance(Duration::from_secs(61));
    limiter.check("new-caller", PolicyName::Scraping);
    assert_eq!(store.len(), 2);

    // When: The sweep runs
    let removed = limiter.sweep();

    // Then: Only the expired counter is gone
    assert_eq!(removed, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(
        limiter.check("new-caller", PolicyName::Scraping).remaining,
        8,
        "live counter keeps its count"
    );
}

#[tokio::test(start_paused = true)]
async fn when_background_sweeper_runs_system_clears_expired_counters() {
    // Given: An expired counter and a running sweeper
    let (limiter, clock, store) = limiter();
    limiter.check("idle-caller", PolicyName::Default);
    clock.advance(Duration::from_secs(120));
    let handle = limiter.spawn_sweeper(Duration::from_secs(60));

    // When: One sweep period elapses
    tokio::time::sleep(Duration::from_secs(61)).await;
    tokio::task::yield_now().await;

    // Then: The counter has been removed
    assert!(store.is_empty());
    handle.abort();
}
