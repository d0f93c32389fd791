//! The get-or-load cache store: approximate LRU with lazy TTL expiry and
//! per-key miss coalescing.

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::keys::CacheKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(120),
            max_entries: 1000,
        }
    }
}

struct Entry<V> {
    value: Arc<V>,
    inserted_at: Instant,
}

/// A typed cache with the shared contract: TTL on access, capacity-bounded
/// approximate LRU, and a per-key gate so overlapping misses invoke the
/// loader once and observe the same value.
pub struct Cache<K: Eq + Hash, V> {
    name: &'static str,
    config: CacheConfig,
    store: Mutex<LruCache<K, Entry<V>>>,
    gates: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + CacheKey,
{
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.max_entries.max(1)).expect("capacity is clamped to >= 1");
        Self {
            name,
            config,
            store: Mutex::new(LruCache::new(capacity)),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached value for `key`, or runs `loader` to produce it.
    ///
    /// Loader errors propagate to the caller that triggered the miss and are
    /// never stored as negative entries; a concurrent waiter simply retries
    /// the load after the failure.
    pub fn get_or_load<E>(
        &self,
        key: K,
        loader: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if !self.config.enabled {
            return loader().map(Arc::new);
        }

        if let Some(value) = self.lookup(&key) {
            trace!(cache = self.name, "cache hit");
            return Ok(value);
        }

        let gate = self.gate(&key);
        let _guard = gate.lock();

        // Double-check under the key gate: another caller may have finished
        // loading while we waited.
        if let Some(value) = self.lookup(&key) {
            trace!(cache = self.name, "cache hit after coalesced wait");
            return Ok(value);
        }

        debug!(cache = self.name, "cache miss, invoking loader");
        match loader() {
            Ok(value) => {
                let value = Arc::new(value);
                self.store.lock().put(
                    key.clone(),
                    Entry {
                        value: value.clone(),
                        inserted_at: Instant::now(),
                    },
                );
                // The value must be visible in the store before the gate goes
                // away, or a late arrival could re-run the loader.
                self.drop_gate(&key);
                Ok(value)
            }
            Err(err) => {
                self.drop_gate(&key);
                Err(err)
            }
        }
    }

    /// Drops every entry whose workspace identity is not in `live`.
    pub fn purge_dead(&self, live: &[u64]) {
        let mut store = self.store.lock();
        let dead: Vec<K> = store
            .iter()
            .filter(|(key, _)| !live.contains(&key.workspace_identity()))
            .map(|(key, _)| key.clone())
            .collect();
        let count = dead.len();
        for key in dead {
            store.pop(&key);
        }
        if count > 0 {
            debug!(cache = self.name, count, "purged entries for dead workspaces");
        }
    }

    pub fn clear(&self) {
        self.store.lock().clear();
    }

    fn lookup(&self, key: &K) -> Option<Arc<V>> {
        let mut store = self.store.lock();
        let expired = match store.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.config.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            store.pop(key);
        }
        None
    }

    fn gate(&self, key: &K) -> Arc<Mutex<()>> {
        self.gates
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn drop_gate(&self, key: &K) {
        self.gates.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::AnalysisKey;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(identity: u64, revision: u64, name: &str) -> AnalysisKey {
        AnalysisKey {
            identity,
            revision,
            class_name: name.to_string(),
            content_hash: 7,
        }
    }

    #[test]
    fn second_get_does_not_invoke_loader() {
        let cache: Cache<AnalysisKey, String> = Cache::new("test", CacheConfig::default());
        let calls = AtomicUsize::new(0);
        let load = || -> Result<String, ()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("value".to_string())
        };

        let first = cache.get_or_load(key(1, 0, "A"), load).unwrap();
        let second = cache
            .get_or_load(key(1, 0, "A"), || -> Result<String, ()> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("other".to_string())
            })
            .unwrap();

        assert_eq!(*first, "value");
        assert_eq!(*second, "value");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn revision_in_key_makes_stale_entries_unreachable() {
        let cache: Cache<AnalysisKey, String> = Cache::new("test", CacheConfig::default());
        cache
            .get_or_load(key(1, 0, "A"), || -> Result<String, ()> {
                Ok("old".to_string())
            })
            .unwrap();
        let fresh = cache
            .get_or_load(key(1, 1, "A"), || -> Result<String, ()> {
                Ok("new".to_string())
            })
            .unwrap();
        assert_eq!(*fresh, "new");
    }

    #[test]
    fn loader_errors_are_not_stored() {
        let cache: Cache<AnalysisKey, String> = Cache::new("test", CacheConfig::default());
        let result = cache.get_or_load(key(1, 0, "A"), || Err::<String, &str>("boom"));
        assert_eq!(result.unwrap_err(), "boom");

        let value = cache
            .get_or_load(key(1, 0, "A"), || -> Result<String, &str> {
                Ok("recovered".to_string())
            })
            .unwrap();
        assert_eq!(*value, "recovered");
    }

    #[test]
    fn concurrent_misses_coalesce_to_one_load() {
        let cache: Arc<Cache<AnalysisKey, String>> =
            Arc::new(Cache::new("test", CacheConfig::default()));
        let calls = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                std::thread::spawn(move || {
                    let value = cache
                        .get_or_load(key(1, 0, "A"), || -> Result<String, ()> {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(20));
                            Ok("shared".to_string())
                        })
                        .unwrap();
                    assert_eq!(*value, "shared");
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_cache_bypasses_store_but_loads() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache: Cache<AnalysisKey, String> = Cache::new("test", config);
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            cache
                .get_or_load(key(1, 0, "A"), || -> Result<String, ()> {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("v".to_string())
                })
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn ttl_expiry_evicts_on_access() {
        let config = CacheConfig {
            ttl: Duration::from_millis(10),
            ..CacheConfig::default()
        };
        let cache: Cache<AnalysisKey, String> = Cache::new("test", config);
        cache
            .get_or_load(key(1, 0, "A"), || -> Result<String, ()> {
                Ok("first".to_string())
            })
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let reloaded = cache
            .get_or_load(key(1, 0, "A"), || -> Result<String, ()> {
                Ok("second".to_string())
            })
            .unwrap();
        assert_eq!(*reloaded, "second");
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let config = CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        };
        let cache: Cache<AnalysisKey, String> = Cache::new("test", config);
        for name in ["A", "B", "C"] {
            cache
                .get_or_load(key(1, 0, name), || -> Result<String, ()> {
                    Ok(name.to_string())
                })
                .unwrap();
        }
        assert_eq!(cache.len(), 2);

        // "A" was evicted; reloading it calls the loader again.
        let calls = AtomicUsize::new(0);
        cache
            .get_or_load(key(1, 0, "A"), || -> Result<String, ()> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("A2".to_string())
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn purge_dead_drops_only_dead_identities() {
        let cache: Cache<AnalysisKey, String> = Cache::new("test", CacheConfig::default());
        for identity in [1, 2, 3] {
            cache
                .get_or_load(key(identity, 0, "A"), || -> Result<String, ()> {
                    Ok("v".to_string())
                })
                .unwrap();
        }
        cache.purge_dead(&[2]);
        assert_eq!(cache.len(), 1);
    }
}
