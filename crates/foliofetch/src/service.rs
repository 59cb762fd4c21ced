//! The surface collaborators depend on

use std::future::Future;
use std::hash::Hash;

use crate::error::Result;
use crate::memo::MemoizingService;
use crate::prefetch::PrefetchingService;

/// A memoized async lookup
///
/// Implemented by both [`MemoizingService`] and [`PrefetchingService`], so
/// consumers can be handed either without caring whether neighbours are
/// warmed.
pub trait CacheableService<K, V, E>: Send + Sync {
    /// Get the value for `key`, computing it if needed
    fn get(&self, key: K) -> impl Future<Output = Result<V, E>> + Send;

    /// Get the value for `key` only if it is already cached
    fn get_cached(&self, key: &K) -> Option<V>;

    /// Drop cached values and detach in-flight executions
    fn invalidate(&self);
}

impl<K, V, E> CacheableService<K, V, E> for MemoizingService<K, V, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn get(&self, key: K) -> impl Future<Output = Result<V, E>> + Send {
        MemoizingService::get(self, key)
    }

    fn get_cached(&self, key: &K) -> Option<V> {
        MemoizingService::get_cached(self, key)
    }

    fn invalidate(&self) {
        MemoizingService::invalidate(self)
    }
}

impl<P, V, E> CacheableService<P, V, E> for PrefetchingService<P, V, E>
where
    P: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn get(&self, page: P) -> impl Future<Output = Result<V, E>> + Send {
        PrefetchingService::get(self, page)
    }

    fn get_cached(&self, page: &P) -> Option<V> {
        PrefetchingService::get_cached(self, page)
    }

    fn invalidate(&self) {
        PrefetchingService::invalidate(self)
    }
}
