//! Time-boxed memo of video search results, keyed by normalised query text.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

/// Source of the current time for expiry checks.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Cache owning its entries and its cleanup task.
///
/// The background cleaner is stopped by [`SearchCache::dispose`] or when the
/// cache is dropped.
pub struct SearchCache<V, C = SystemClock> {
    entries: Arc<DashMap<String, Entry<V>>>,
    ttl: Duration,
    clock: Arc<C>,
    cleaner: Mutex<Option<JoinHandle<()>>>,
}

/// Lowercased, trimmed form used as the cache key.
pub fn cache_key(query: &str) -> String {
    query.trim().to_lowercase()
}

impl<V> SearchCache<V, SystemClock>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<V, C> SearchCache<V, C>
where
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            clock: Arc::new(clock),
            cleaner: Mutex::new(None),
        }
    }

    /// Cached value for `query`, unless missing or expired.
    pub fn get(&self, query: &str) -> Option<V> {
        let key = cache_key(query);
        let now = self.clock.now();
        let hit = self
            .entries
            .get(&key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone());
        if hit.is_none() {
            self.entries
                .remove_if(&key, |_, entry| entry.expires_at <= now);
        }
        hit
    }

    pub fn insert(&self, query: &str, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries
            .insert(cache_key(query), Entry { value, expires_at });
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries, self.clock.now())
    }

    /// Spawn the periodic cleanup task, replacing any previous one.
    pub fn start_cleaner(&self, interval: Duration) {
        let entries = Arc::downgrade(&self.entries);
        let clock = self.clock.clone();
        let job = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                let removed = purge(&entries, clock.now());
                if removed > 0 {
                    debug!(removed, "purged expired search results");
                }
            }
        });

        match self.cleaner.lock() {
            Ok(mut slot) => {
                if let Some(previous) = slot.replace(job) {
                    previous.abort();
                }
            }
            Err(_) => job.abort(),
        }
    }

    /// Whether a cleanup task is currently attached.
    pub fn has_cleaner(&self) -> bool {
        self.cleaner
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|job| !job.is_finished()))
            .unwrap_or(false)
    }

    /// Stop the cleanup task and release every entry.
    pub fn dispose(&self) {
        if let Ok(mut slot) = self.cleaner.lock()
            && let Some(job) = slot.take()
        {
            job.abort();
        }
        self.entries.clear();
    }
}

impl<V, C> Drop for SearchCache<V, C> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.cleaner.lock()
            && let Some(job) = slot.take()
        {
            job.abort();
        }
    }
}

fn purge<V>(entries: &DashMap<String, Entry<V>>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.expires_at > now);
    before.saturating_sub(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct ManualClock(Arc<Mutex<Instant>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Instant::now())))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }
    }

    const TTL: Duration = Duration::from_secs(300);

    #[test]
    fn keys_ignore_case_and_padding() {
        let cache = SearchCache::with_clock(TTL, ManualClock::new());
        cache.insert("  Queen ", vec![1]);
        assert_eq!(cache.get("queen"), Some(vec![1]));
        assert_eq!(cache.get("QUEEN"), Some(vec![1]));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let clock = ManualClock::new();
        let cache = SearchCache::with_clock(TTL, clock.clone());
        cache.insert("queen", "results");

        clock.advance(TTL - Duration::from_secs(1));
        assert_eq!(cache.get("queen"), Some("results"));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("queen"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_only_drops_expired_entries() {
        let clock = ManualClock::new();
        let cache = SearchCache::with_clock(TTL, clock.clone());
        cache.insert("old", 1);
        clock.advance(Duration::from_secs(200));
        cache.insert("new", 2);
        clock.advance(Duration::from_secs(150));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cleaner_runs_until_disposed() {
        let clock = ManualClock::new();
        let cache = SearchCache::with_clock(TTL, clock.clone());
        cache.insert("queen", 1);
        cache.start_cleaner(Duration::from_secs(60));
        assert!(cache.has_cleaner());

        clock.advance(TTL);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.len(), 0);

        cache.insert("abba", 2);
        cache.dispose();
        tokio::task::yield_now().await;
        assert!(!cache.has_cleaner());
        assert!(cache.is_empty());
    }
}
