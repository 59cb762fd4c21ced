//! MemoizingService: single-flight wrapper around an async lookup
//!
//! Concurrent `get` calls for the same key share one execution of the
//! wrapped operation. Successful values land in the [`Cache`]; failures are
//! handed to every waiter and then forgotten.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use ahash::RandomState;
use foliocache::Cache;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::multicast::MulticastWaiter;
use crate::stats::FlightStats;

/// The expensive lookup a service memoizes
pub type CacheableOperation<K, V, E> =
    Arc<dyn Fn(K) -> BoxFuture<'static, std::result::Result<V, E>> + Send + Sync>;

type Waiter<V, E> = Arc<MulticastWaiter<Result<V, E>>>;

struct State<K, V, E> {
    in_progress: HashMap<K, Waiter<V, E>, RandomState>,
}

struct Shared<K, V, E> {
    cache: Cache<K, V>,
    state: Mutex<State<K, V, E>>,
    operation: CacheableOperation<K, V, E>,
    stats: FlightStats,
}

enum Lookup<V, E> {
    Ready(V),
    Waiting(oneshot::Receiver<Result<V, E>>),
}

/// Single-flight memoizing service
///
/// Cloning is cheap; clones share the cache, the in-flight table and the
/// operation.
pub struct MemoizingService<K, V, E> {
    shared: Arc<Shared<K, V, E>>,
}

impl<K, V, E> Clone for MemoizingService<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V, E> fmt::Debug for MemoizingService<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizingService")
            .field("pending", &self.shared.state.lock().in_progress.len())
            .field("stats", &self.shared.stats)
            .finish_non_exhaustive()
    }
}

impl<K, V, E> MemoizingService<K, V, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Wrap `operation`, storing its results in `cache`
    ///
    /// # Example
    /// ```
    /// # use foliocache::Cache;
    /// # use foliofetch::MemoizingService;
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let squares = MemoizingService::new(Cache::new(), |page: u32| async move {
    ///     Ok::<_, std::io::Error>(page * page)
    /// });
    ///
    /// assert_eq!(squares.get(4).await.unwrap(), 16);
    /// assert_eq!(squares.get_cached(&4), Some(16));
    /// # }
    /// ```
    pub fn new<F, Fut>(cache: Cache<K, V>, operation: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        let operation: CacheableOperation<K, V, E> = Arc::new(move |key| operation(key).boxed());
        Self::from_operation(cache, operation)
    }

    /// Wrap an already type-erased operation
    pub fn from_operation(cache: Cache<K, V>, operation: CacheableOperation<K, V, E>) -> Self {
        Self {
            shared: Arc::new(Shared {
                cache,
                state: Mutex::new(State {
                    in_progress: HashMap::with_hasher(RandomState::new()),
                }),
                operation,
                stats: FlightStats::new(),
            }),
        }
    }

    /// Get the value for `key`, computing it at most once across concurrent callers
    ///
    /// Dropping the returned future does not cancel the shared execution.
    ///
    /// # Panics
    /// Launching a new execution spawns onto the current tokio runtime, so
    /// this must be polled from within one.
    pub async fn get(&self, key: K) -> Result<V, E> {
        if let Some(value) = self.shared.cache.get(&key) {
            return Ok(value);
        }

        match self.lookup(key) {
            Lookup::Ready(value) => Ok(value),
            Lookup::Waiting(rx) => rx.await.unwrap_or(Err(Error::Abandoned)),
        }
    }

    /// Get the cached value for `key`; never computes and never waits
    pub fn get_cached(&self, key: &K) -> Option<V> {
        self.shared.cache.get(key)
    }

    /// Clear the cache and forget every in-flight execution
    ///
    /// Running executions are not cancelled. Callers already waiting on them
    /// still get their outcome, but later callers start a fresh execution
    /// instead of joining an old one.
    pub fn invalidate(&self) {
        let mut state = self.shared.state.lock();
        let orphaned = state.in_progress.len();
        state.in_progress.clear();
        self.shared.cache.remove_all();
        debug!(orphaned, "service invalidated");
    }

    /// Number of keys with a registered in-flight execution
    pub fn pending_len(&self) -> usize {
        self.shared.state.lock().in_progress.len()
    }

    /// Single-flight statistics
    pub fn flight_stats(&self) -> &FlightStats {
        &self.shared.stats
    }

    /// The cache this service populates
    pub fn cache(&self) -> &Cache<K, V> {
        &self.shared.cache
    }

    /// Join the execution in flight for `key`, or register and launch one.
    fn lookup(&self, key: K) -> Lookup<V, E> {
        let mut state = self.shared.state.lock();

        // A flight may have finished between the cache miss and taking the lock
        if let Some(value) = self.shared.cache.peek(&key) {
            return Lookup::Ready(value);
        }

        if let Some(rx) = state.in_progress.get(&key).and_then(|w| w.subscribe()) {
            self.shared.stats.record_joined();
            trace!(pending = state.in_progress.len(), "joined in-flight operation");
            return Lookup::Waiting(rx);
        }

        let (waiter, rx) = MulticastWaiter::with_subscriber();
        let waiter = Arc::new(waiter);
        state.in_progress.insert(key.clone(), Arc::clone(&waiter));
        drop(state);

        self.launch(key, waiter);
        Lookup::Waiting(rx)
    }

    fn launch(&self, key: K, waiter: Waiter<V, E>) {
        self.shared.stats.record_started();
        debug!("starting operation");

        let shared = Arc::clone(&self.shared);
        let operation = Arc::clone(&self.shared.operation);
        let input = key.clone();
        let run = AssertUnwindSafe(async move { operation(input).await }).catch_unwind();

        tokio::spawn(async move {
            let outcome = match run.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(Error::Operation(Arc::new(err))),
                Err(_) => Err(Error::Panicked),
            };
            shared.complete(key, &waiter, outcome);
        });
    }
}

impl<K, V, E> Shared<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Publish `outcome` for one execution.
    ///
    /// Cache write, waiter resolution and unregistration happen under a
    /// single acquisition of the state lock.
    fn complete(&self, key: K, waiter: &Waiter<V, E>, outcome: Result<V, E>) {
        let mut state = self.state.lock();

        let success = outcome.is_ok();
        if let Ok(value) = &outcome {
            self.cache.set(key.clone(), value.clone());
        }
        self.stats.record_outcome(success);
        waiter.resolve(outcome);

        // An invalidated execution must not unregister a newer one for the same key
        let current = state
            .in_progress
            .get(&key)
            .is_some_and(|registered| Arc::ptr_eq(registered, waiter));
        if current {
            state.in_progress.remove(&key);
        }

        debug!(success, orphaned = !current, "operation finished");
    }
}
