//! A per-key guard that lets only one caller at a time work on the same key.

use std::{collections::HashMap, fmt::Debug, hash::Hash, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

type Flight = Arc<tokio::sync::Mutex<()>>;

/// Serializes work on the same key while leaving different keys independent.
///
/// Callers are expected to double-check: look for a finished result, [`Self::lock`] the key if there is none, then look again before doing the work. Whoever waited on the lock will find the result of the caller before it.
///
/// See: [`example`]
#[derive(Debug)]
pub struct SingleFlight<K>
where
    K: Eq + Hash,
{
    flights: Mutex<HashMap<K, Flight>>,
}

impl<K> Default for SingleFlight<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> SingleFlight<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Creates a [`SingleFlight`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other caller holds `key`, then holds it until the returned guard is dropped.
    pub async fn lock(&self, key: K) -> FlightGuard<'_, K> {
        let flight = self.flights.lock().entry(key.clone()).or_default().clone();
        if flight.try_lock().is_err() {
            debug!("waiting for the in-flight work on {key:?}…");
        }
        let guard = flight.lock_owned().await;

        FlightGuard {
            owner: self,
            key,
            guard: Some(guard),
        }
    }

    /// The number of keys currently held or waited on.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}

/// Holds a key of a [`SingleFlight`]. The key is released on drop.
#[derive(Debug)]
pub struct FlightGuard<'a, K>
where
    K: Eq + Hash,
{
    owner: &'a SingleFlight<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for FlightGuard<'_, K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        drop(self.guard.take());

        // Waiters clone the flight under the same lock, so a count of one means nobody is queued
        let mut flights = self.owner.flights.lock();
        if flights
            .get(&self.key)
            .is_some_and(|flight| Arc::strong_count(flight) == 1)
        {
            flights.remove(&self.key);
        }
    }
}

#[cfg(test)]
#[tokio::test]
async fn example() {
    use std::{
        collections::HashSet,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    static FLIGHTS: std::sync::LazyLock<SingleFlight<&'static str>> =
        std::sync::LazyLock::new(SingleFlight::new);
    static DONE: std::sync::LazyLock<Mutex<HashSet<&'static str>>> =
        std::sync::LazyLock::new(Default::default);
    static WORK: AtomicUsize = AtomicUsize::new(0);

    async fn fetch(key: &'static str) {
        // Looks for a finished result first...
        if DONE.lock().contains(key) {
            return;
        }
        // ...then holds the key and looks again, since a previous holder may have finished it
        let _flight = FLIGHTS.lock(key).await;
        if DONE.lock().contains(key) {
            return;
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        WORK.fetch_add(1, Ordering::SeqCst);
        DONE.lock().insert(key);
    }

    let (a, b, c) = tokio::join!(
        tokio::spawn(fetch("42")),
        tokio::spawn(fetch("42")),
        tokio::spawn(fetch("43")),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(WORK.load(Ordering::SeqCst), 2);
    assert_eq!(FLIGHTS.in_flight(), 0);
}
