use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::Result;

struct CacheEntry {
    value: String,
    stored_at: Instant,
}

/// Introspection snapshot of the cache contents. Keys are sorted so output
/// is stable across runs.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// TTL-expiring memoization layer in front of the REST Countries API.
///
/// Values are stored as serialized JSON, so the cache is agnostic to what
/// the producer returns. Freshness is always decided at read time by
/// comparing the entry's age against the fixed `ttl`; the background sweeper
/// spawned by [`FetchCache::spawn_sweeper`] only bounds memory and is never
/// the source of truth for staleness.
///
/// Concurrent `get_or_fetch` calls for the same key are not coalesced: each
/// runs its own producer and the last one to finish overwrites the entry.
pub struct FetchCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl FetchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Return the cached value for `key` if it is younger than the TTL,
    /// otherwise run `producer`, store its result, and return it.
    ///
    /// A producer failure propagates to the caller untouched and nothing is
    /// stored, so a later call retries. An empty key bypasses the cache
    /// entirely. A hit that no longer deserializes as `T` is treated as a
    /// miss and overwritten.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if key.is_empty() {
            debug!("Empty cache key, bypassing cache");
            return producer().await;
        }

        if let Some(json) = self.lookup(key) {
            match serde_json::from_str::<T>(&json) {
                Ok(value) => {
                    debug!(key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(key, error = %e, "Cached value no longer deserializes, refetching");
                }
            }
        }

        let value = producer().await?;

        if let Ok(json) = serde_json::to_string(&value) {
            self.store(key, json);
        }

        Ok(value)
    }

    /// Drop every entry immediately. Does not cancel in-flight producers;
    /// their results are stored when they resolve.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            let dropped = entries.len();
            entries.clear();
            debug!(dropped, "Cache cleared");
        } else {
            error!("Cache lock poisoned on clear, skipping");
        }
    }

    /// Remove entries strictly older than the TTL. Returns how many were
    /// removed. Never panics: a poisoned lock is logged and the sweep skipped.
    pub fn sweep(&self) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            error!("Cache lock poisoned on sweep, skipping");
            return 0;
        };
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() <= ttl);
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let Ok(entries) = self.entries.read() else {
            error!("Cache lock poisoned on stats, reporting empty");
            return CacheStats {
                size: 0,
                keys: Vec::new(),
            };
        };
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort_unstable();
        CacheStats {
            size: entries.len(),
            keys,
        }
    }

    /// Spawn the periodic sweep task. The returned handle outlives the cache
    /// wiring and must be aborted for clean shutdown.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = self;
        tokio::spawn(async move {
            info!(
                interval_secs = interval.as_secs(),
                "Cache sweeper started"
            );
            loop {
                tokio::time::sleep(interval).await;
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(removed, "Sweep removed stale cache entries");
                }
            }
        })
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let Ok(entries) = self.entries.read() else {
            error!("Cache lock poisoned on get('{key}'), returning miss");
            return None;
        };
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn store(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                key.to_string(),
                CacheEntry {
                    value,
                    stored_at: Instant::now(),
                },
            );
        } else {
            error!("Cache lock poisoned on set('{key}'), skipping write");
        }
    }
}

impl std::fmt::Debug for FetchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCache").field("ttl", &self.ttl).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::CountryError;

    const TTL: Duration = Duration::from_secs(300);

    fn cache() -> FetchCache {
        FetchCache::new(TTL)
    }

    #[tokio::test(start_paused = true)]
    async fn hit_returns_stored_value_without_producer_call() {
        let cache = cache();
        let calls = AtomicUsize::new(0);

        let first: String = cache
            .get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("one".to_string())
            })
            .await
            .unwrap();
        let second: String = cache
            .get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("two".to_string())
            })
            .await
            .unwrap();

        assert_eq!(first, "one");
        assert_eq!(second, "one");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_forces_refetch() {
        let cache = cache();

        let _: String = cache
            .get_or_fetch("k", || async { Ok("stale".to_string()) })
            .await
            .unwrap();

        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        let calls = AtomicUsize::new(0);
        let value: String = cache
            .get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("fresh".to_string())
            })
            .await
            .unwrap();

        assert_eq!(value, "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_exactly_ttl_old_is_stale() {
        let cache = cache();

        let _: String = cache
            .get_or_fetch("k", || async { Ok("old".to_string()) })
            .await
            .unwrap();

        // Freshness is a strict `<`, so an entry exactly TTL old misses.
        tokio::time::advance(TTL).await;

        let calls = AtomicUsize::new(0);
        let value: String = cache
            .get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("new".to_string())
            })
            .await
            .unwrap();

        assert_eq!(value, "new");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn producer_failure_propagates_and_stores_nothing() {
        let cache = cache();

        let err = cache
            .get_or_fetch::<String, _, _>("k", || async { Err(CountryError::RateLimited) })
            .await
            .unwrap_err();
        assert!(matches!(err, CountryError::RateLimited));
        assert_eq!(cache.stats().size, 0);

        // The failed fetch must not block a retry.
        let value: String = cache
            .get_or_fetch("k", || async { Ok("recovered".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "recovered");
        assert_eq!(cache.stats().size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_forces_miss_before_ttl() {
        let cache = cache();

        let _: String = cache
            .get_or_fetch("k", || async { Ok("cached".to_string()) })
            .await
            .unwrap();

        cache.clear();

        let calls = AtomicUsize::new(0);
        let value: String = cache
            .get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("refetched".to_string())
            })
            .await
            .unwrap();

        assert_eq!(value, "refetched");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_on_empty_cache_is_idempotent() {
        let cache = cache();
        cache.clear();
        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn prefixed_keys_sharing_a_value_do_not_collide() {
        let cache = cache();

        let code: String = cache
            .get_or_fetch("code:USA", || async { Ok("the country".to_string()) })
            .await
            .unwrap();
        let region: String = cache
            .get_or_fetch("region:USA", || async { Ok("a region".to_string()) })
            .await
            .unwrap();

        assert_eq!(code, "the country");
        assert_eq!(region, "a region");

        let code_again: String = cache
            .get_or_fetch("code:USA", || async { Ok("never".to_string()) })
            .await
            .unwrap();
        assert_eq!(code_again, "the country");
        assert_eq!(cache.stats().size, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_stale_entries() {
        let cache = cache();

        let _: String = cache
            .get_or_fetch("old", || async { Ok("a".to_string()) })
            .await
            .unwrap();
        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        let _: String = cache
            .get_or_fetch("young", || async { Ok("b".to_string()) })
            .await
            .unwrap();

        let removed = cache.sweep();

        assert_eq!(removed, 1);
        assert_eq!(cache.stats().keys, vec!["young".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_exactly_ttl_old_survives_sweep_but_misses_reads() {
        let cache = cache();

        let _: String = cache
            .get_or_fetch("k", || async { Ok("edge".to_string()) })
            .await
            .unwrap();
        tokio::time::advance(TTL).await;

        // Sweep removes strictly-older-than-TTL, so the boundary entry stays...
        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.stats().size, 1);

        // ...while the read-time check already considers it stale.
        let calls = AtomicUsize::new(0);
        let _: String = cache
            .get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("refetched".to_string())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(TTL + Duration::from_millis(1)).await;
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_key_bypasses_cache() {
        let cache = cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: String = cache
                .get_or_fetch("", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("uncached".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "uncached");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_during_inflight_producer_stores_late_result() {
        let cache = Arc::new(FetchCache::new(TTL));

        let task_cache = Arc::clone(&cache);
        let task = tokio::spawn(async move {
            task_cache
                .get_or_fetch("k", || async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok("late".to_string())
                })
                .await
        });

        tokio::task::yield_now().await;
        cache.clear();

        let value = task.await.unwrap().unwrap();
        assert_eq!(value, "late");
        // clear does not cancel in-flight producers; the late result lands.
        assert_eq!(cache.stats().keys, vec!["k".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_same_key_calls_are_not_coalesced() {
        let cache = cache();
        let calls = AtomicUsize::new(0);

        let (first, second) = tokio::join!(
            cache.get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok("first".to_string())
            }),
            cache.get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok("second".to_string())
            }),
        );

        assert_eq!(first.unwrap(), "first");
        assert_eq!(second.unwrap(), "second");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Last writer wins on the shared entry.
        let cached: String = cache
            .get_or_fetch("k", || async { Ok("never".to_string()) })
            .await
            .unwrap();
        assert_eq!(cached, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn hit_that_fails_to_deserialize_is_a_miss() {
        let cache = cache();

        let _: String = cache
            .get_or_fetch("k", || async { Ok("text".to_string()) })
            .await
            .unwrap();

        // Same key read back as a different type: refetch instead of erroring.
        let calls = AtomicUsize::new(0);
        let value: u64 = cache
            .get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unserializable_result_is_returned_but_not_stored() {
        let cache = cache();

        // Maps with non-string keys cannot be encoded as JSON objects.
        let calls = AtomicUsize::new(0);
        let value: HashMap<(u8, u8), u8> = cache
            .get_or_fetch("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(HashMap::from([((1, 2), 3)]))
            })
            .await
            .unwrap();

        assert_eq!(value.len(), 1);
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_removes_stale_entries_on_schedule() {
        let cache = Arc::new(FetchCache::new(Duration::from_secs(2)));
        let handle = Arc::clone(&cache).spawn_sweeper(Duration::from_secs(5));

        let _: String = cache
            .get_or_fetch("k", || async { Ok("v".to_string()) })
            .await
            .unwrap();
        assert_eq!(cache.stats().size, 1);

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(cache.stats().size, 0);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_is_abortable() {
        let cache = Arc::new(FetchCache::new(TTL));
        let handle = Arc::clone(&cache).spawn_sweeper(Duration::from_secs(60));

        handle.abort();
        let err = handle.await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
