//! PrefetchingService: memoized page lookups that warm nearby pages
//!
//! After a page resolves successfully, the pages around it (per the
//! [`PageWindow`]) are requested in the background through the same
//! single-flight service. A reader who turns the page finds it cached, or
//! joins the execution already running for it.

use std::fmt;
use std::future::Future;
use std::hash::Hash;

use foliocache::Cache;
use tracing::trace;

use crate::error::Result;
use crate::memo::{CacheableOperation, MemoizingService};
use crate::window::PageWindow;

/// Memoizing service over an ordered set of pages with neighbour prefetch
pub struct PrefetchingService<P, V, E> {
    service: MemoizingService<P, V, E>,
    window: PageWindow<P>,
}

impl<P: Clone, V, E> Clone for PrefetchingService<P, V, E> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            window: self.window.clone(),
        }
    }
}

impl<P, V, E> fmt::Debug for PrefetchingService<P, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchingService")
            .field("service", &self.service)
            .field("pages", &self.window.pages().len())
            .field("previous", &self.window.previous())
            .field("next", &self.window.next())
            .finish()
    }
}

impl<P, V, E> PrefetchingService<P, V, E>
where
    P: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a service over `pages` that warms `previous_pages_count`
    /// pages behind and `next_pages_count` pages ahead of each request
    pub fn new<F, Fut>(
        cache: Cache<P, V>,
        previous_pages_count: usize,
        next_pages_count: usize,
        pages: Vec<P>,
        operation: F,
    ) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        Self::with_service(
            MemoizingService::new(cache, operation),
            PageWindow::new(pages, previous_pages_count, next_pages_count),
        )
    }

    /// Same as [`new`](Self::new), for an already type-erased operation
    pub fn from_operation(
        cache: Cache<P, V>,
        window: PageWindow<P>,
        operation: CacheableOperation<P, V, E>,
    ) -> Self {
        Self::with_service(MemoizingService::from_operation(cache, operation), window)
    }

    /// Wrap an existing memoizing service
    pub fn with_service(service: MemoizingService<P, V, E>, window: PageWindow<P>) -> Self {
        Self { service, window }
    }

    /// Get `page`, then warm its neighbours in the background
    ///
    /// Returns as soon as the neighbour requests are launched. Their failures
    /// are swallowed. A failed primary lookup launches nothing, and a page
    /// outside the configured list is returned without prefetching.
    pub async fn get(&self, page: P) -> Result<V, E> {
        let value = self.service.get(page.clone()).await?;
        self.prefetch_around(&page);
        Ok(value)
    }

    /// Get the cached value for `page`; never computes or prefetches
    pub fn get_cached(&self, page: &P) -> Option<V> {
        self.service.get_cached(page)
    }

    /// Clear the cache and detach in-flight executions
    pub fn invalidate(&self) {
        self.service.invalidate();
    }

    /// The prefetch window
    pub fn window(&self) -> &PageWindow<P> {
        &self.window
    }

    /// The underlying single-flight service
    pub fn service(&self) -> &MemoizingService<P, V, E> {
        &self.service
    }

    fn prefetch_around(&self, page: &P) {
        for neighbour in self.window.neighbours(page) {
            if self.service.cache().contains(&neighbour) {
                continue;
            }

            let service = self.service.clone();
            tokio::spawn(async move {
                if service.get(neighbour).await.is_err() {
                    trace!("prefetch failed");
                }
            });
        }
    }
}
