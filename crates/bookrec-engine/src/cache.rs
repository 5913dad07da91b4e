//! Bounded LRU cache with single-flight computation.
//!
//! Recency is a monotonically increasing tick per access; `recency` maps tick
//! to key so the least recently used entry is always the first one. A key that
//! is being computed has a `Flight` in `in_flight`; later callers for the same
//! key wait on it instead of computing again. The leader computes without
//! holding the cache lock.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use bookrec_core::{Result, RetrievalError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered without running a computation, including waiters.
    pub hits: u64,
    /// Computations started.
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

struct Flight<V> {
    result: Mutex<Option<Result<V>>>,
    done: Condvar,
}

impl<V: Clone> Flight<V> {
    fn new() -> Self { Self { result: Mutex::new(None), done: Condvar::new() } }

    fn wait(&self) -> Result<V> {
        let mut slot = lock(&self.result);
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self.done.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn publish(&self, result: Result<V>) {
        *lock(&self.result) = Some(result);
        self.done.notify_all();
    }
}

struct Inner<K, V> {
    entries: HashMap<K, (V, u64)>,
    recency: BTreeMap<u64, K>,
    in_flight: HashMap<K, Arc<Flight<V>>>,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> Inner<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, key: &K) -> Option<V> {
        let tick = self.next_tick();
        let (value, last) = self.entries.get_mut(key)?;
        let previous = std::mem::replace(last, tick);
        let value = value.clone();
        self.recency.remove(&previous);
        self.recency.insert(tick, key.clone());
        Some(value)
    }

    /// Insert as most recent; returns true when an older entry was evicted.
    fn insert(&mut self, key: K, value: V, capacity: usize) -> bool {
        let tick = self.next_tick();
        if let Some((_, previous)) = self.entries.insert(key.clone(), (value, tick)) {
            self.recency.remove(&previous);
        }
        self.recency.insert(tick, key);
        if self.entries.len() > capacity {
            if let Some((_, oldest)) = self.recency.pop_first() {
                self.entries.remove(&oldest);
                return true;
            }
        }
        false
    }
}

pub struct QueryCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Eq + Hash + Clone, V: Clone> QueryCache<K, V> {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner { entries: HashMap::new(), recency: BTreeMap::new(), in_flight: HashMap::new(), tick: 0 }),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize { self.capacity }
    pub fn len(&self) -> usize { lock(&self.inner).entries.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Presence check; does not refresh recency.
    pub fn contains(&self, key: &K) -> bool { lock(&self.inner).entries.contains_key(key) }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: self.len(),
            capacity: self.capacity,
        }
    }

    /// Return the cached value for `key`, or run `compute` once and cache its
    /// success. Concurrent callers with the same key share one computation and
    /// all receive its outcome; a failure is returned to each of them and
    /// leaves nothing cached.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let flight = {
            let mut inner = lock(&self.inner);
            if let Some(value) = inner.touch(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("query cache hit");
                return Ok(value);
            }
            if let Some(flight) = inner.in_flight.get(&key).map(Arc::clone) {
                drop(inner);
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("query cache: waiting on in-flight computation");
                return flight.wait();
            }
            let flight = Arc::new(Flight::new());
            inner.in_flight.insert(key.clone(), Arc::clone(&flight));
            flight
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("query cache miss");
        let leader = Leader { cache: self, key, flight, settled: false };
        let result = compute();
        leader.finish(result)
    }

    fn settle(&self, key: &K, flight: &Flight<V>, result: Result<V>) {
        {
            let mut inner = lock(&self.inner);
            inner.in_flight.remove(key);
            if let Ok(value) = &result {
                if inner.insert(key.clone(), value.clone(), self.capacity) {
                    tracing::debug!(capacity = self.capacity, "query cache evicted least recently used entry");
                }
            }
        }
        flight.publish(result);
    }
}

/// Owns the flight of a running computation. Dropping it unsettled (the
/// computation panicked) releases waiters with `ComputationAborted`.
struct Leader<'c, K: Eq + Hash + Clone, V: Clone> {
    cache: &'c QueryCache<K, V>,
    key: K,
    flight: Arc<Flight<V>>,
    settled: bool,
}

impl<K: Eq + Hash + Clone, V: Clone> Leader<'_, K, V> {
    fn finish(mut self, result: Result<V>) -> Result<V> {
        self.settled = true;
        self.cache.settle(&self.key, &self.flight, result.clone());
        result
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Drop for Leader<'_, K, V> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::error!("query cache computation panicked");
            self.cache.settle(&self.key, &self.flight, Err(RetrievalError::ComputationAborted("computation panicked".to_string())));
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap_or_else(PoisonError::into_inner) }
