//! Stat caching
//!
//! A read-through cache from name to [`StatSet`]. Both implementations
//! construct at most one set per distinct name, even when many callers race
//! to reference a name first, and never replace or evict a set once built.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::{StatSet, StatSource};

/// Read-through cache of shared stat sets
pub trait StatCache: Send + Sync {
    /// Shared set for `name`, built from the backing source on first use
    fn get(&self, name: &str) -> Arc<StatSet>;
}

/// [`StatCache`] backed by a map behind a read/write lock
///
/// Lookups take the read lock; misses take the write lock and re-check
/// before constructing.
pub struct LockedStatCache {
    src: Arc<dyn StatSource>,
    lookup: RwLock<HashMap<String, Arc<StatSet>>>,
}

impl LockedStatCache {
    /// Create an empty cache over `src`
    pub fn new(src: Arc<dyn StatSource>) -> Self {
        Self {
            src,
            lookup: RwLock::new(HashMap::new()),
        }
    }
}

impl StatCache for LockedStatCache {
    fn get(&self, name: &str) -> Arc<StatSet> {
        if let Some(set) = self.lookup.read().get(name) {
            return Arc::clone(set);
        }

        let mut lookup = self.lookup.write();
        // Another caller may have built the set while we waited.
        if let Some(set) = lookup.get(name) {
            return Arc::clone(set);
        }

        debug!(name, "creating stat set");
        let set = Arc::new(StatSet::new(self.src.as_ref(), name));
        lookup.insert(name.to_string(), Arc::clone(&set));
        set
    }
}

/// [`StatCache`] backed by a sharded concurrent map
///
/// Construction happens inside the map's insert-if-absent entry, under the
/// owning shard's lock.
pub struct ShardedStatCache {
    src: Arc<dyn StatSource>,
    lookup: DashMap<String, Arc<StatSet>>,
}

impl ShardedStatCache {
    /// Create an empty cache over `src`
    pub fn new(src: Arc<dyn StatSource>) -> Self {
        Self {
            src,
            lookup: DashMap::new(),
        }
    }
}

impl StatCache for ShardedStatCache {
    fn get(&self, name: &str) -> Arc<StatSet> {
        if let Some(set) = self.lookup.get(name) {
            return Arc::clone(set.value());
        }

        let entry = self.lookup.entry(name.to_string()).or_insert_with(|| {
            debug!(name, "creating stat set");
            Arc::new(StatSet::new(self.src.as_ref(), name))
        });
        Arc::clone(entry.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Counter, Timer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts how many handles were constructed per call.
    #[derive(Default)]
    struct CountingSource {
        timers: AtomicUsize,
        counters: AtomicUsize,
    }

    impl StatSource for CountingSource {
        fn timer(&self, _name: &str) -> Timer {
            self.timers.fetch_add(1, Ordering::SeqCst);
            // widen the race window for concurrent first access
            std::thread::sleep(Duration::from_millis(1));
            Arc::new(|_: Duration| {})
        }

        fn counter(&self, _name: &str) -> Counter {
            self.counters.fetch_add(1, Ordering::SeqCst);
            Arc::new(|_: i64| {})
        }
    }

    fn hammer(cache: Arc<dyn StatCache>) {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for name in ["foo", "bar", "foo", "baz"] {
                        cache.get(name);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_locked_cache_builds_once_per_name() {
        let src = Arc::new(CountingSource::default());
        let cache = Arc::new(LockedStatCache::new(src.clone()));

        hammer(cache.clone());

        assert_eq!(src.timers.load(Ordering::SeqCst), 3);
        assert_eq!(src.counters.load(Ordering::SeqCst), 6);
        assert!(Arc::ptr_eq(&cache.get("foo"), &cache.get("foo")));
    }

    #[test]
    fn test_sharded_cache_builds_once_per_name() {
        let src = Arc::new(CountingSource::default());
        let cache = Arc::new(ShardedStatCache::new(src.clone()));

        hammer(cache.clone());

        assert_eq!(src.timers.load(Ordering::SeqCst), 3);
        assert_eq!(src.counters.load(Ordering::SeqCst), 6);
        assert!(Arc::ptr_eq(&cache.get("bar"), &cache.get("bar")));
    }
}
