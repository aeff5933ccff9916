//! Memoization of finished splices
//!
//! Keyed on (original identity, ad identity). The target size is not part of
//! the key: it is derived from the catalog and stable for the life of the
//! process. Each key owns a `OnceCell`, so concurrent requests for the same
//! splice share one computation instead of racing to write the entry.
//! Capacity is bounded; the oldest entry is evicted first.

use crate::error::Result;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Cache key: (original asset key, ad asset key)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub original: String,
    pub ad: String,
}

impl CacheKey {
    pub fn new(original: impl Into<String>, ad: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            ad: ad.into(),
        }
    }
}

type Slot = Arc<OnceCell<Bytes>>;

#[derive(Default)]
struct CacheState {
    slots: HashMap<CacheKey, Slot>,
    /// Insertion order, oldest first
    order: VecDeque<CacheKey>,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded splice result cache with per-key single-flight computation
pub struct ResultCache {
    capacity: usize,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` splices (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached bytes for the pair, or run `compute` and cache its result
    ///
    /// Concurrent callers with the same key wait on a single `compute`.
    /// A failed computation is not cached; the next caller tries again.
    pub async fn get_or_compute<F, Fut>(
        &self,
        original_key: &str,
        ad_key: &str,
        target_size: u64,
        compute: F,
    ) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>>,
    {
        let key = CacheKey::new(original_key, ad_key);
        let slot = self.slot(&key);

        if let Some(bytes) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(original = %key.original, ad = %key.ad, "Cache hit");
            if bytes.len() as u64 != target_size {
                warn!(
                    cached = bytes.len(),
                    target_size,
                    "Cached splice was produced for a different target size"
                );
            }
            return Ok(bytes.clone());
        }

        let mut computed_here = false;
        let outcome = slot
            .get_or_try_init(|| {
                computed_here = true;
                compute()
            })
            .await
            .cloned();

        if computed_here {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            // Another caller finished the computation while we waited
            self.hits.fetch_add(1, Ordering::Relaxed);
        }

        if outcome.is_err() {
            self.forget_failed(&key, &slot);
        }
        outcome
    }

    /// Whether a finished splice is cached for the pair
    pub fn contains(&self, original_key: &str, ad_key: &str) -> bool {
        let key = CacheKey::new(original_key, ad_key);
        self.lock()
            .slots
            .get(&key)
            .is_some_and(|slot| slot.initialized())
    }

    /// Number of finished splices held
    pub fn len(&self) -> usize {
        self.lock().slots.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Get or insert the slot for `key`, evicting the oldest slots over capacity
    fn slot(&self, key: &CacheKey) -> Slot {
        let mut state = self.lock();
        if let Some(slot) = state.slots.get(key) {
            return slot.clone();
        }

        let slot: Slot = Arc::new(OnceCell::new());
        state.slots.insert(key.clone(), slot.clone());
        state.order.push_back(key.clone());

        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                // In-flight computations still finish for their waiters; the
                // result just is not retained
                state.slots.remove(&oldest);
                debug!(original = %oldest.original, ad = %oldest.ad, "Evicted cached splice");
            }
        }
        slot
    }

    /// Drop a slot whose computation failed, unless it was replaced meanwhile
    fn forget_failed(&self, key: &CacheKey, slot: &Slot) {
        let mut state = self.lock();
        let same_slot = state
            .slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized());
        if same_slot {
            state.slots.remove(key);
            state.order.retain(|k| k != key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // A panic while holding the lock cannot leave the map half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn payload(len: usize) -> Bytes {
        Bytes::from(vec![7u8; len])
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = ResultCache::new(4);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let bytes = cache
                .get_or_compute("music.mp3", "ad1.mp3", 100, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(payload(100))
                })
                .await
                .unwrap();
            assert_eq!(bytes.len(), 100);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { entries: 1, hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn test_distinct_ads_are_distinct_entries() {
        let cache = ResultCache::new(4);
        cache.get_or_compute("m", "a", 1, || async { Ok(payload(1)) }).await.unwrap();
        cache.get_or_compute("m", "b", 1, || async { Ok(payload(1)) }).await.unwrap();
        assert!(cache.contains("m", "a"));
        assert!(cache.contains("m", "b"));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_computation_not_cached() {
        let cache = ResultCache::new(4);
        let result = cache
            .get_or_compute("m", "a", 1, || async { Err(Error::EncodingFailure("boom".into())) })
            .await;
        assert!(matches!(result, Err(Error::EncodingFailure(_))));
        assert!(!cache.contains("m", "a"));
        assert!(cache.is_empty());

        let bytes = cache.get_or_compute("m", "a", 1, || async { Ok(payload(1)) }).await.unwrap();
        assert_eq!(bytes.len(), 1);
        assert!(cache.contains("m", "a"));
    }

    #[tokio::test]
    async fn test_oldest_entry_evicted_over_capacity() {
        let cache = ResultCache::new(2);
        for ad in ["a", "b", "c"] {
            cache.get_or_compute("m", ad, 1, || async { Ok(payload(1)) }).await.unwrap();
        }
        assert!(!cache.contains("m", "a"));
        assert!(cache.contains("m", "b"));
        assert!(cache.contains("m", "c"));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_requests_compute_once() {
        let cache = Arc::new(ResultCache::new(4));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_compute("m", "a", 64, || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(payload(64))
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().len(), 64);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 7);
    }

    #[test]
    fn test_capacity_floor() {
        assert_eq!(ResultCache::new(0).capacity(), 1);
    }
}
