//! Process-wide memoization with single-flight compilation.
//!
//! For any key, at most one compilation runs at a time across all threads.
//! Every caller that arrives while a compilation is in flight blocks on the
//! same entry and receives the same completed routine, or the same failure.
//! A failure leaves the key vacant so the next request compiles again.

use crate::error::MapError;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex};

struct FlightEntry<V> {
    result: Mutex<Option<Result<Arc<V>, Arc<MapError>>>>,
    cv: Condvar,
}

impl<V> Default for FlightEntry<V> {
    fn default() -> Self {
        FlightEntry { result: Mutex::new(None), cv: Condvar::new() }
    }
}

struct Inner<K, V> {
    done: HashMap<K, Arc<V>>,
    inflight: HashMap<K, Arc<FlightEntry<V>>>,
}

pub struct FlightCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> Default for FlightCache<K, V> {
    fn default() -> Self {
        FlightCache { inner: Mutex::new(Inner { done: HashMap::new(), inflight: HashMap::new() }) }
    }
}

enum Role<V> {
    Leader(Arc<FlightEntry<V>>),
    Waiter(Arc<FlightEntry<V>>),
}

impl<K: Eq + Hash + Clone, V> FlightCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the completed routine for `key`, compiling it with `compile`
    /// if nobody has yet. Concurrent callers for the same key share one
    /// compilation; on failure every sharer receives the error wrapped in
    /// [`MapError::Shared`] and the key stays vacant.
    pub fn get_or_compile<F>(&self, key: K, compile: F) -> Result<Arc<V>, MapError>
    where
        F: FnOnce() -> Result<V, MapError>,
    {
        let role = {
            let mut inner = self.inner.lock()?;
            if let Some(v) = inner.done.get(&key) {
                return Ok(Arc::clone(v));
            }
            match inner.inflight.get(&key) {
                Some(entry) => Role::Waiter(Arc::clone(entry)),
                None => {
                    let entry = Arc::new(FlightEntry::default());
                    inner.inflight.insert(key.clone(), Arc::clone(&entry));
                    Role::Leader(entry)
                }
            }
        };
        match role {
            Role::Waiter(entry) => {
                let mut done = entry.result.lock()?;
                loop {
                    if let Some(res) = done.as_ref() {
                        return match res {
                            Ok(v) => Ok(Arc::clone(v)),
                            Err(e) => Err(MapError::Shared(Arc::clone(e))),
                        };
                    }
                    done = entry.cv.wait(done)?;
                }
            }
            Role::Leader(entry) => {
                // A panicking compiler must not strand waiters on the entry.
                let mut guard = LeaderGuard { cache: self, key: Some(key), entry };
                let outcome = compile();
                guard.finish(outcome)
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.lock().ok()?.done.get(key).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.done.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct LeaderGuard<'a, K: Eq + Hash + Clone, V> {
    cache: &'a FlightCache<K, V>,
    key: Option<K>,
    entry: Arc<FlightEntry<V>>,
}

impl<K: Eq + Hash + Clone, V> LeaderGuard<'_, K, V> {
    fn finish(&mut self, outcome: Result<V, MapError>) -> Result<Arc<V>, MapError> {
        let Some(key) = self.key.take() else {
            return Err(MapError::Internal("single-flight leader finished twice".to_string()));
        };
        let mut inner = self.cache.inner.lock()?;
        inner.inflight.remove(&key);
        let (stored, returned) = match outcome {
            Ok(v) => {
                let arc = Arc::new(v);
                inner.done.insert(key, Arc::clone(&arc));
                (Ok(Arc::clone(&arc)), Ok(arc))
            }
            Err(e) => {
                let arc = Arc::new(e);
                (Err(Arc::clone(&arc)), Err(MapError::Shared(arc)))
            }
        };
        drop(inner);
        let mut done = self.entry.result.lock()?;
        *done = Some(stored);
        drop(done);
        self.entry.cv.notify_all();
        returned
    }
}

impl<K: Eq + Hash + Clone, V> Drop for LeaderGuard<'_, K, V> {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else { return };
        crate::error!("mapping compiler panicked, failing every waiter on the key");
        if let Ok(mut inner) = self.cache.inner.lock() {
            inner.inflight.remove(&key);
        }
        if let Ok(mut done) = self.entry.result.lock() {
            *done = Some(Err(Arc::new(MapError::Compilation("mapping compiler panicked".to_string()))));
        }
        self.entry.cv.notify_all();
    }
}
