//! Session settings
//!
//! Loaded from an optional JSON file, then overridden by command-line flags.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Everything a reading session needs to know
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Number of pages in the book
    pub pages: u32,
    /// Pages warmed behind the one being read
    pub previous: usize,
    /// Pages warmed ahead of the one being read
    pub next: usize,
    /// Rendered pages kept in memory (0 = unbounded)
    pub capacity: usize,
    /// Simulated render time per page
    pub latency_ms: u64,
    /// Every n-th page fails to render
    pub fail_every: Option<u32>,
    /// Concurrent readers
    pub readers: usize,
    /// Fire the memory-pressure notifier after this many page views
    pub purge_after: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pages: 100,
            previous: 1,
            next: 2,
            capacity: 5,
            latency_ms: 25,
            fail_every: None,
            readers: 1,
            purge_after: None,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {:?}", path))
    }

    /// Reject settings the session cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pages == 0 {
            bail!("pages must be at least 1");
        }
        if self.readers == 0 {
            bail!("readers must be at least 1");
        }
        if self.fail_every == Some(0) {
            bail!("fail_every must be at least 1");
        }
        Ok(())
    }

    /// Compact JSON form, loadable again with [`load`](Self::load)
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize settings")
    }

    /// Simulated render time
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}
