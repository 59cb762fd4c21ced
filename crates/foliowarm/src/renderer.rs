//! Simulated page renderer
//!
//! Stands in for the expensive work a real reader does per page (decoding
//! an image, assembling translated text). Deterministic per page number.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Output of one render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// Page number
    pub number: u32,
    /// Rendered content
    pub content: Arc<str>,
}

/// Render failure
#[derive(Debug)]
pub enum RenderError {
    /// The page's source data could not be read
    Unreadable(u32),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Unreadable(page) => write!(f, "Page {} is unreadable", page),
        }
    }
}

impl std::error::Error for RenderError {}

/// Slow, occasionally failing page source
#[derive(Debug)]
pub struct PageRenderer {
    latency: Duration,
    fail_every: Option<u32>,
    renders: AtomicU64,
}

impl PageRenderer {
    /// Create a renderer; pages divisible by `fail_every` always fail
    pub fn new(latency: Duration, fail_every: Option<u32>) -> Self {
        Self {
            latency,
            fail_every: fail_every.filter(|n| *n > 0),
            renders: AtomicU64::new(0),
        }
    }

    /// Render `page`
    pub async fn render(&self, page: u32) -> Result<RenderedPage, RenderError> {
        self.renders.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.fail_every.is_some_and(|n| page % n == 0) {
            return Err(RenderError::Unreadable(page));
        }

        Ok(RenderedPage {
            number: page,
            content: format!("page {page}").into(),
        })
    }

    /// Number of render attempts so far
    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }
}
