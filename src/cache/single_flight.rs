//! Single-flight memoization table.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument, trace};

use super::flight::{Flight, Outcome};
use super::metrics::{CacheMetrics, CacheStats};

/// Caller-supplied computation producing the value for a key
pub type ComputeFn<K, V, E> = dyn Fn(&K) -> Result<V, E> + Send + Sync;

enum Slot<V, E> {
    Ready(V),
    Pending(Arc<Flight<V, E>>),
}

struct Table<K, V, E> {
    /// Bumped by every `clear()`
    generation: u64,
    slots: HashMap<K, Slot<V, E>>,
}

enum Lookup<V, E> {
    Hit(V),
    Wait(Arc<Flight<V, E>>),
    Lead(Arc<Flight<V, E>>, u64),
}

/// Memoizing cache that runs the computation at most once per key per generation
pub struct SingleFlightCache<K, V, E = Infallible> {
    compute: Box<ComputeFn<K, V, E>>,
    table: Mutex<Table<K, V, E>>,
    /// Only written while `table` is locked
    compute_count: AtomicU64,
    metrics: CacheMetrics,
}

impl<K, V, E> SingleFlightCache<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    /// Create a cache around `compute`
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        Self {
            compute: Box::new(compute),
            table: Mutex::new(Table {
                generation: 0,
                slots: HashMap::new(),
            }),
            compute_count: AtomicU64::new(0),
            metrics: CacheMetrics::new(),
        }
    }

    /// Return the value for `key`, computing it if this generation has none.
    ///
    /// Concurrent callers for the same missing key share one computation;
    /// an error from it is handed to every one of them.
    pub fn get_or_compute(&self, key: &K) -> Result<V, Arc<E>> {
        loop {
            match self.lookup(key) {
                Lookup::Hit(value) => return Ok(value),
                Lookup::Wait(flight) => match flight.wait() {
                    Outcome::Done(result) => return result,
                    Outcome::Abandoned => debug!(?key, "Computation abandoned, retrying"),
                },
                Lookup::Lead(flight, generation) => return self.lead(key, &flight, generation),
            }
        }
    }

    fn lookup(&self, key: &K) -> Lookup<V, E> {
        let mut table = self.table.lock();
        match table.slots.get(key) {
            Some(Slot::Ready(value)) => {
                self.metrics.record_hit();
                Lookup::Hit(value.clone())
            }
            Some(Slot::Pending(flight)) => {
                self.metrics.record_coalesced();
                Lookup::Wait(Arc::clone(flight))
            }
            None => {
                let flight = Arc::new(Flight::new());
                table
                    .slots
                    .insert(key.clone(), Slot::Pending(Arc::clone(&flight)));
                self.compute_count.fetch_add(1, Ordering::AcqRel);
                self.metrics.record_miss();
                Lookup::Lead(flight, table.generation)
            }
        }
    }

    fn lead(&self, key: &K, flight: &Arc<Flight<V, E>>, generation: u64) -> Result<V, Arc<E>> {
        trace!(?key, generation, "computing");

        let mut guard = LeaderGuard {
            cache: self,
            key,
            flight,
            generation,
            landed: false,
        };
        let result = (self.compute)(key).map_err(Arc::new);
        guard.land(&result);

        result
    }

    /// Replace our pending slot, unless `clear()` already retired it.
    fn settle(&self, key: &K, flight: &Arc<Flight<V, E>>, generation: u64, value: Option<V>) {
        let mut table = self.table.lock();
        if table.generation != generation {
            return;
        }

        let ours = matches!(
            table.slots.get(key),
            Some(Slot::Pending(pending)) if Arc::ptr_eq(pending, flight)
        );
        if !ours {
            return;
        }

        match value {
            Some(value) => {
                table.slots.insert(key.clone(), Slot::Ready(value));
            }
            None => {
                table.slots.remove(key);
            }
        }
    }

    /// Look up a computed value without computing
    pub fn get(&self, key: &K) -> Option<V> {
        match self.table.lock().slots.get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Check whether a computed value exists for `key`
    pub fn contains(&self, key: &K) -> bool {
        matches!(self.table.lock().slots.get(key), Some(Slot::Ready(_)))
    }

    /// Number of times the computation ran since construction or the last clear
    pub fn compute_count(&self) -> u64 {
        self.compute_count.load(Ordering::Acquire)
    }

    /// Drop every entry and start a new generation.
    #[instrument(level = "debug", skip(self))]
    pub fn clear(&self) {
        let mut table = self.table.lock();
        let dropped = table.slots.len();
        table.slots.clear();
        table.generation += 1;
        self.compute_count.store(0, Ordering::Release);
        self.metrics.reset();

        debug!(generation = table.generation, dropped, "Cache cleared");
    }

    /// Number of computed entries
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Check if no entry is computed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the metrics collector
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.metrics.hits(),
            misses: self.metrics.misses(),
            coalesced: self.metrics.coalesced(),
            failures: self.metrics.failures(),
            compute_count: self.compute_count(),
            hit_ratio: self.metrics.hit_ratio(),
        }
    }
}

impl<K, V, E> fmt::Debug for SingleFlightCache<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlightCache")
            .field("compute_count", &self.compute_count.load(Ordering::Relaxed))
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

/// Publishes the leader's result; abandons the flight if the computation unwinds.
struct LeaderGuard<'a, K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    cache: &'a SingleFlightCache<K, V, E>,
    key: &'a K,
    flight: &'a Arc<Flight<V, E>>,
    generation: u64,
    landed: bool,
}

impl<K, V, E> LeaderGuard<'_, K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    fn land(&mut self, result: &Result<V, Arc<E>>) {
        let value = match result {
            Ok(value) => Some(value.clone()),
            Err(_) => {
                self.cache.metrics.record_failure();
                None
            }
        };

        // Table first, so a caller woken by the flight never finds it still pending.
        self.cache
            .settle(self.key, self.flight, self.generation, value);
        self.flight.complete(result.clone());
        self.landed = true;
    }
}

impl<K, V, E> Drop for LeaderGuard<'_, K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    fn drop(&mut self) {
        if !self.landed {
            self.cache
                .settle(self.key, self.flight, self.generation, None);
            self.flight.abandon();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn slow_len_cache() -> SingleFlightCache<String, usize> {
        SingleFlightCache::new(|key: &String| {
            thread::sleep(Duration::from_millis(50));
            Ok(key.len())
        })
    }

    #[test]
    fn test_compute_once_then_hit() {
        let cache = SingleFlightCache::new(|key: &u32| Ok::<_, Infallible>(key * 2));

        assert_eq!(cache.get_or_compute(&21).unwrap(), 42);
        assert_eq!(cache.get_or_compute(&21).unwrap(), 42);
        assert_eq!(cache.compute_count(), 1);

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_distinct_keys_compute_separately() {
        let cache = SingleFlightCache::new(|key: &u32| Ok::<_, Infallible>(key + 1));

        cache.get_or_compute(&1).unwrap();
        cache.get_or_compute(&2).unwrap();
        assert_eq!(cache.compute_count(), 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&1));
        assert!(!cache.contains(&3));
        assert_eq!(cache.get(&2), Some(3));
        assert_eq!(cache.get(&3), None);
    }

    #[test]
    fn test_concurrent_first_access_computes_once() {
        let cache = Arc::new(slow_len_cache());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_compute(&"test-key".to_string()).unwrap()
                })
            })
            .collect();

        let results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(results.iter().all(|r| *r == results[0]));
        assert_eq!(results[0], 8);
        assert_eq!(cache.compute_count(), 1);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits + stats.coalesced, 7);
    }

    #[test]
    fn test_clear_starts_new_generation() {
        let cache = slow_len_cache();
        cache.get_or_compute(&"abc".to_string()).unwrap();
        assert_eq!(cache.compute_count(), 1);

        cache.get_or_compute(&"abc".to_string()).unwrap();

        cache.clear();
        assert_eq!(cache.compute_count(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), slow_len_cache().stats());

        cache.get_or_compute(&"abc".to_string()).unwrap();
        assert_eq!(cache.compute_count(), 1);
    }

    #[test]
    fn test_clear_during_computation_does_not_repopulate() {
        let cache = Arc::new(slow_len_cache());

        let leader = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get_or_compute(&"key".to_string()).unwrap())
        };

        thread::sleep(Duration::from_millis(10));
        cache.clear();

        // Old generation still answers its own caller
        assert_eq!(leader.join().unwrap(), 3);

        // ...but did not populate the new generation
        assert!(!cache.contains(&"key".to_string()));
        assert_eq!(cache.compute_count(), 0);

        cache.get_or_compute(&"key".to_string()).unwrap();
        assert_eq!(cache.compute_count(), 1);
    }

    #[test]
    fn test_error_shared_and_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let cache = SingleFlightCache::new(move |key: &u32| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(format!("backend down for {}", key))
            } else {
                Ok(*key)
            }
        });

        let err = cache.get_or_compute(&5).unwrap_err();
        assert_eq!(err.as_str(), "backend down for 5");
        assert!(!cache.contains(&5));
        assert_eq!(cache.stats().failures, 1);

        // Next call recomputes
        assert_eq!(cache.get_or_compute(&5).unwrap(), 5);
        assert_eq!(cache.compute_count(), 2);
    }

    #[test]
    fn test_waiters_receive_leader_error() {
        let cache = Arc::new(SingleFlightCache::new(|_: &u32| {
            thread::sleep(Duration::from_millis(50));
            Err::<u32, _>("unavailable".to_string())
        }));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_compute(&1)
                })
            })
            .collect();

        for handle in handles {
            let err = handle.join().unwrap().unwrap_err();
            assert_eq!(err.as_str(), "unavailable");
        }
        assert_eq!(cache.compute_count(), 1);
    }

    #[test]
    fn test_unrelated_keys_not_serialized() {
        let (release_tx, release_rx) = crossbeam::channel::bounded::<()>(0);
        let cache = Arc::new(SingleFlightCache::new(move |key: &String| {
            if key == "slow" {
                release_rx.recv().unwrap();
            }
            Ok::<_, Infallible>(key.len())
        }));

        let slow = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get_or_compute(&"slow".to_string()).unwrap())
        };
        thread::sleep(Duration::from_millis(20));

        // Would deadlock if the slow computation held the table lock
        assert_eq!(cache.get_or_compute(&"fast".to_string()).unwrap(), 4);

        release_tx.send(()).unwrap();
        assert_eq!(slow.join().unwrap(), 4);
    }

    #[test]
    fn test_panicking_leader_hands_over() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let cache = Arc::new(SingleFlightCache::new(move |key: &u32| {
            thread::sleep(Duration::from_millis(50));
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("compute blew up");
            }
            Ok::<_, Infallible>(*key)
        }));

        let leader = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get_or_compute(&9))
        };
        thread::sleep(Duration::from_millis(10));
        let waiter = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get_or_compute(&9))
        };

        assert!(leader.join().is_err());
        assert_eq!(waiter.join().unwrap().unwrap(), 9);
        assert_eq!(cache.compute_count(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
