//! Memory-pressure notifier
//!
//! The host environment owns one [`MemoryPressure`] and fires it whenever it
//! wants every registered cache emptied (a low-memory warning, a signal, an
//! admin command). Registration is weak: a cache that has been dropped is
//! silently forgotten on the next notification.

use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{Cache, Inner};

/// Anything that can be emptied on demand
trait Purge: Send + Sync {
    fn purge(&self);
    fn label(&self) -> Option<&str>;
}

impl<K, V> Purge for Inner<K, V>
where
    K: Hash + Eq + Clone + Send,
    V: Send,
{
    fn purge(&self) {
        self.remove_all();
    }

    fn label(&self) -> Option<&str> {
        self.name()
    }
}

/// Fan-out point for the external "clear everything" signal
#[derive(Clone, Default)]
pub struct MemoryPressure {
    subscribers: Arc<Mutex<Vec<Weak<dyn Purge>>>>,
}

impl MemoryPressure {
    /// Create a notifier with no registered caches
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cache` to be cleared on every [`notify`](Self::notify)
    ///
    /// Registering the same cache (or a clone of its handle) again is a no-op.
    pub fn register<K, V>(&self, cache: &Cache<K, V>)
    where
        K: Hash + Eq + Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        let weak: Weak<dyn Purge> = Arc::downgrade(cache.inner()) as Weak<dyn Purge>;
        let mut subscribers = self.subscribers.lock();
        if subscribers.iter().any(|known| Weak::ptr_eq(known, &weak)) {
            return;
        }
        subscribers.push(weak);
    }

    /// Clear every live registered cache, returning how many were cleared
    pub fn notify(&self) -> usize {
        let live: Vec<Arc<dyn Purge>> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };

        for cache in &live {
            debug!(
                cache = cache.label().unwrap_or("unnamed"),
                "memory pressure: purging cache"
            );
            cache.purge();
        }
        live.len()
    }

    /// Number of registered caches that are still alive
    pub fn len(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Check whether no live cache is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
