//! In-memory TTL cache for price lookups.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Defines how a lookup interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read from the cache if a non-expired entry is present;
    /// otherwise fetch and write the result to the cache.
    #[default]
    Use,
    /// Always fetch, then overwrite the cached entry.
    Refresh,
    /// Always fetch and neither read nor write the cache.
    Bypass,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheInner<V> {
    map: HashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
    last_sweep: Instant,
}

/// Thread-safe TTL cache keyed by string.
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Arc<tokio::sync::RwLock<CacheInner<V>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner {
                map: HashMap::new(),
                default_ttl,
                last_sweep: Instant::now(),
            })),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let store = self.inner.read().await;
        store
            .map
            .get(key)
            .filter(|entry| Instant::now() <= entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    /// Stores `value`; a no-op when the TTL is zero.
    ///
    /// Expired entries are dropped at most once per TTL as a side effect, so
    /// the map stays bounded by the keys written within roughly two TTLs.
    pub async fn put(&self, key: String, value: V) {
        let mut store = self.inner.write().await;
        if store.default_ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        if now.duration_since(store.last_sweep) >= store.default_ttl {
            remove_expired(&mut store, now);
        }
        let expires_at = now + store.default_ttl;
        store.map.insert(key, CacheEntry { value, expires_at });
    }

    /// Drops expired entries and returns how many were removed.
    pub async fn clear_expired(&self) -> usize {
        let mut store = self.inner.write().await;
        remove_expired(&mut store, Instant::now())
    }

    /// Number of entries, including expired ones not yet cleared.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

}

fn remove_expired<V>(store: &mut CacheInner<V>, now: Instant) -> usize {
    let before = store.map.len();
    store.map.retain(|_, entry| entry.expires_at > now);
    store.last_sweep = now;
    before - store.map.len()
}
