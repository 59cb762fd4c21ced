//! Reading session: concurrent readers paging through one shared service

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use foliocache::{Cache, CacheConfig, MemoryPressure, StatsSnapshot};
use foliofetch::PrefetchingService;
use tracing::{debug, info, warn};

use crate::renderer::{PageRenderer, RenderError, RenderedPage};
use crate::settings::Settings;

/// Page service the readers share
pub type PageService = PrefetchingService<u32, RenderedPage, RenderError>;

/// Totals printed at the end of a session
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Pages requested by readers
    pub views: u64,
    /// Requests that failed
    pub failures: u64,
    /// Render attempts, prefetches included
    pub renders: u64,
    /// Executions started by the page service
    pub started: u64,
    /// Executions that callers joined instead of starting
    pub joined: u64,
    /// Memory-pressure purges fired by the session
    pub purges: u64,
    /// Cache counters
    pub cache: StatsSnapshot,
}

/// Shared state of one session
pub struct Session {
    settings: Settings,
    service: PageService,
    cache: Cache<u32, RenderedPage>,
    renderer: Arc<PageRenderer>,
    pressure: MemoryPressure,
    views: AtomicU64,
    failures: AtomicU64,
    purges: AtomicU64,
}

impl Session {
    /// Build the cache, notifier and service described by `settings`
    pub fn new(settings: Settings) -> Result<Arc<Self>> {
        settings.validate().context("Invalid session settings")?;

        let cache = Cache::with_config(
            CacheConfig::new()
                .with_name("rendered-pages")
                .with_count_limit(settings.capacity),
        );
        let pressure = MemoryPressure::new();
        pressure.register(&cache);

        let renderer = Arc::new(PageRenderer::new(settings.latency(), settings.fail_every));
        let service = PrefetchingService::new(
            cache.clone(),
            settings.previous,
            settings.next,
            (1..=settings.pages).collect(),
            {
                let renderer = Arc::clone(&renderer);
                move |page| {
                    let renderer = Arc::clone(&renderer);
                    async move { renderer.render(page).await }
                }
            },
        );

        Ok(Arc::new(Self {
            settings,
            service,
            cache,
            renderer,
            pressure,
            views: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            purges: AtomicU64::new(0),
        }))
    }

    /// Notifier the host can fire to purge the page cache
    pub fn pressure(&self) -> &MemoryPressure {
        &self.pressure
    }

    /// Run every reader to the end of the book
    pub async fn run(self: &Arc<Self>) -> Result<Summary> {
        let readers: Vec<_> = (0..self.settings.readers)
            .map(|reader| {
                let session = Arc::clone(self);
                tokio::spawn(async move { session.read(reader).await })
            })
            .collect();

        for reader in readers {
            reader.await.context("Reader task failed")?;
        }

        Ok(self.summary())
    }

    /// Read every page once, starting at an offset so readers overlap
    async fn read(&self, reader: usize) {
        let pages = self.settings.pages;
        let start = (reader as u64 * u64::from(pages) / self.settings.readers as u64) as u32;

        for step in 0..pages {
            let page = (start + step) % pages + 1;
            match self.service.get(page).await {
                Ok(rendered) => debug!(reader, page = rendered.number, "page shown"),
                Err(e) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(reader, page, "Failed to show page: {}", e);
                }
            }
            self.record_view();
        }
    }

    fn record_view(&self) {
        let views = self.views.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(every) = self.settings.purge_after.filter(|n| *n > 0) {
            if views % every == 0 {
                let purged = self.pressure.notify();
                self.purges.fetch_add(1, Ordering::Relaxed);
                info!(views, purged, "Memory pressure fired");
            }
        }
    }

    /// Totals so far
    pub fn summary(&self) -> Summary {
        let flights = self.service.service().flight_stats();
        Summary {
            views: self.views.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            renders: self.renderer.renders(),
            started: flights.started(),
            joined: flights.joined(),
            purges: self.purges.load(Ordering::Relaxed),
            cache: self.cache.stats().snapshot(),
        }
    }
}
