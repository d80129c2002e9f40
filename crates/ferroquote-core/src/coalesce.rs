//! At-most-one in-flight fetch per key.
//!
//! The first caller for a key becomes the leader: it registers an entry and
//! spawns the fetch as its own task. Later callers find the entry and wait on
//! the same `watch` channel. The task publishes the result and removes the
//! entry under one lock, so an arrival either sees the entry (and the retained
//! value) or finds nothing and starts a new fetch.
//!
//! Since the fetch is a separate task, a caller that gives up waiting never
//! cancels it; the result still reaches the other waiters and whatever the
//! fetch itself writes, such as the cache.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{FetchError, Payload, ProviderId};

type Outcome = Option<Result<Payload, FetchError>>;
type InFlightMap<K> = Arc<Mutex<HashMap<K, InFlight>>>;

#[derive(Debug)]
struct InFlight {
    result: watch::Receiver<Outcome>,
    waiters: Arc<AtomicUsize>,
}

/// Cumulative coalescing counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalescerStats {
    /// Fetches started.
    pub leaders: u64,
    /// Calls that attached to a fetch already in flight.
    pub joined: u64,
}

/// Request coalescing coordinator keyed by `K`.
#[derive(Debug)]
pub struct Coalescer<K> {
    in_flight: InFlightMap<K>,
    attribution: ProviderId,
    leaders: AtomicU64,
    joined: AtomicU64,
}

impl<K> Default for Coalescer<K> {
    fn default() -> Self {
        Self::new(ProviderId::TwelveData)
    }
}

impl<K> Coalescer<K> {
    /// `attribution` names the provider reported when a fetch task dies without a result.
    pub fn new(attribution: ProviderId) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            attribution,
            leaders: AtomicU64::new(0),
            joined: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            leaders: self.leaders.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
        }
    }
}

impl<K> Coalescer<K>
where
    K: Eq + Hash + Clone + Display + Send + 'static,
{
    /// Runs `fetch` for `key` unless one is already in flight, then waits for the shared result.
    ///
    /// Every caller attached to the same fetch receives an identical clone of
    /// its outcome, error included.
    pub async fn coalesce<F, Fut>(&self, key: K, fetch: F) -> Result<Payload, FetchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Payload, FetchError>> + Send + 'static,
    {
        let (receiver, waiters, _) = self.register(key.clone(), fetch);
        let _attached = WaiterGuard::attach(waiters);
        self.wait(receiver, &key).await
    }

    /// Starts `fetch` for `key` without waiting; joins silently if one is already running.
    ///
    /// Returns `true` when a new fetch was started.
    pub fn spawn<F, Fut>(&self, key: K, fetch: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Payload, FetchError>> + Send + 'static,
    {
        let (_, _, started) = self.register(key, fetch);
        started
    }

    /// Number of fetches currently running.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Callers currently waiting on `key`, or `None` when nothing is in flight for it.
    pub fn waiters(&self, key: &K) -> Option<usize> {
        lock(&self.in_flight)
            .get(key)
            .map(|entry| entry.waiters.load(Ordering::SeqCst))
    }

    fn register<F, Fut>(&self, key: K, fetch: F) -> (watch::Receiver<Outcome>, Arc<AtomicUsize>, bool)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Payload, FetchError>> + Send + 'static,
    {
        let mut in_flight = lock(&self.in_flight);
        if let Some(entry) = in_flight.get(&key) {
            self.joined.fetch_add(1, Ordering::Relaxed);
            tracing::info!(key = %key, "joining in-flight fetch");
            return (entry.result.clone(), Arc::clone(&entry.waiters), false);
        }

        let (sender, receiver) = watch::channel(None);
        let waiters = Arc::new(AtomicUsize::new(0));
        in_flight.insert(
            key.clone(),
            InFlight {
                result: receiver.clone(),
                waiters: Arc::clone(&waiters),
            },
        );
        drop(in_flight);
        self.leaders.fetch_add(1, Ordering::Relaxed);

        let mut completion = Completion {
            in_flight: Arc::clone(&self.in_flight),
            key,
            sender,
            published: false,
        };
        tokio::spawn(async move {
            let outcome = fetch().await;
            completion.publish(outcome);
        });

        (receiver, waiters, true)
    }

    async fn wait(
        &self,
        mut receiver: watch::Receiver<Outcome>,
        key: &K,
    ) -> Result<Payload, FetchError> {
        loop {
            let current = receiver.borrow_and_update().clone();
            if let Some(outcome) = current {
                return outcome;
            }

            if receiver.changed().await.is_err() {
                let last = receiver.borrow().clone();
                return last.unwrap_or_else(|| {
                    Err(FetchError::unknown(
                        self.attribution,
                        format!("fetch for {key} was abandoned before completing"),
                    ))
                });
            }
        }
    }
}

/// Publishes a fetch outcome and retires the in-flight entry.
///
/// If the fetch task unwinds before publishing, the entry is still removed
/// and the dropped sender wakes every waiter.
struct Completion<K: Eq + Hash> {
    in_flight: InFlightMap<K>,
    key: K,
    sender: watch::Sender<Outcome>,
    published: bool,
}

impl<K: Eq + Hash> Completion<K> {
    fn publish(&mut self, outcome: Result<Payload, FetchError>) {
        let mut in_flight = lock(&self.in_flight);
        self.sender.send_replace(Some(outcome));
        in_flight.remove(&self.key);
        self.published = true;
    }
}

impl<K: Eq + Hash> Drop for Completion<K> {
    fn drop(&mut self) {
        if !self.published {
            lock(&self.in_flight).remove(&self.key);
        }
    }
}

struct WaiterGuard(Arc<AtomicUsize>);

impl WaiterGuard {
    fn attach(waiters: Arc<AtomicUsize>) -> Self {
        waiters.fetch_add(1, Ordering::SeqCst);
        Self(waiters)
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<K>(map: &Mutex<HashMap<K, InFlight>>) -> MutexGuard<'_, HashMap<K, InFlight>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}
