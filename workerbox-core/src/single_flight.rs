//! Single-flight deduplication of keyed loads
//!
//! While a load for a key is running, later requests for the same key wait
//! for its result instead of starting a second load. Nothing is cached once
//! the load finishes; callers keep their own record table.

use futures::channel::oneshot;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

/// Per-key in-flight table for single-threaded async loads
pub struct SingleFlight<K, V> {
    in_flight: RefCell<HashMap<K, Vec<oneshot::Sender<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            in_flight: RefCell::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `load` for `key` unless a load for it is already running, in
    /// which case wait for that load's result.
    ///
    /// If the running load is dropped before finishing its waiters retry,
    /// and one of them becomes the new leader.
    pub async fn run<F, Fut>(&self, key: K, load: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        loop {
            let waiter = {
                let mut in_flight = self.in_flight.borrow_mut();
                match in_flight.get_mut(&key) {
                    Some(waiters) => {
                        let (tx, rx) = oneshot::channel();
                        waiters.push(tx);
                        Some(rx)
                    }
                    None => {
                        in_flight.insert(key.clone(), Vec::new());
                        None
                    }
                }
            };
            match waiter {
                Some(rx) => match rx.await {
                    Ok(value) => return value,
                    Err(oneshot::Canceled) => continue,
                },
                None => break,
            }
        }

        let guard = FlightGuard {
            flight: self,
            key: Some(key),
        };
        let value = load().await;
        guard.finish(&value);
        value
    }

    /// Whether a load for `key` is currently running
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.in_flight.borrow().contains_key(key)
    }

    /// Number of keys currently loading
    pub fn len(&self) -> usize {
        self.in_flight.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.borrow().is_empty()
    }
}

/// Removes the in-flight entry when the leading load ends or is dropped
struct FlightGuard<'a, K: Hash + Eq, V> {
    flight: &'a SingleFlight<K, V>,
    key: Option<K>,
}

impl<K: Hash + Eq, V: Clone> FlightGuard<'_, K, V> {
    fn finish(mut self, value: &V) {
        if let Some(key) = self.key.take() {
            let waiters = self.flight.in_flight.borrow_mut().remove(&key);
            for waiter in waiters.into_iter().flatten() {
                let _ = waiter.send(value.clone());
            }
        }
    }
}

impl<K: Hash + Eq, V> Drop for FlightGuard<'_, K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            // Dropping the senders wakes waiters with `Canceled`
            self.flight.in_flight.borrow_mut().remove(&key);
        }
    }
}
