//! Folio cache warmer - simulated reading session over the page cache

mod renderer;
mod session;
mod settings;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::session::Session;
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of pages in the book
    #[arg(long)]
    pages: Option<u32>,

    /// Pages warmed behind the current one
    #[arg(long)]
    previous: Option<usize>,

    /// Pages warmed ahead of the current one
    #[arg(long)]
    next: Option<usize>,

    /// Rendered pages kept in memory (0 = unbounded)
    #[arg(short = 'C', long)]
    capacity: Option<usize>,

    /// Simulated render time per page, in milliseconds
    #[arg(long)]
    latency_ms: Option<u64>,

    /// Make every n-th page fail to render
    #[arg(long)]
    fail_every: Option<u32>,

    /// Concurrent readers
    #[arg(short, long)]
    readers: Option<usize>,

    /// Fire memory pressure after this many page views
    #[arg(long)]
    purge_after: Option<u64>,
}

impl Args {
    /// Settings file (or defaults) with flags applied on top
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if let Some(pages) = self.pages {
            settings.pages = pages;
        }
        if let Some(previous) = self.previous {
            settings.previous = previous;
        }
        if let Some(next) = self.next {
            settings.next = next;
        }
        if let Some(capacity) = self.capacity {
            settings.capacity = capacity;
        }
        if let Some(latency_ms) = self.latency_ms {
            settings.latency_ms = latency_ms;
        }
        if self.fail_every.is_some() {
            settings.fail_every = self.fail_every;
        }
        if let Some(readers) = self.readers {
            settings.readers = readers;
        }
        if self.purge_after.is_some() {
            settings.purge_after = self.purge_after;
        }

        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let settings = args.settings()?;

    info!("Starting Folio cache warmer v{}", env!("CARGO_PKG_VERSION"));
    info!("Pages: {}", settings.pages);
    info!("Window: {} back, {} ahead", settings.previous, settings.next);
    info!("Cache capacity: {}", settings.capacity);
    info!("Readers: {}", settings.readers);
    debug!("Effective settings: {}", settings.to_json()?);

    let session = Session::new(settings.clone())?;

    #[cfg(unix)]
    watch_pressure_signal(session.pressure().clone())?;

    let started = Instant::now();
    let summary = session.run().await?;
    let elapsed = started.elapsed();

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║          Folio Reading Session Complete                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("\n📖 SESSION:");
    println!("   Readers:         {}", settings.readers);
    println!("   Page views:      {}", summary.views);
    println!("   Failed views:    {}", summary.failures);
    println!("   Elapsed:         {:.2?}", elapsed);
    println!("\n⚙️  RENDERING:");
    println!("   Renders:         {}", summary.renders);
    println!("   Flights started: {}", summary.started);
    println!("   Joined flights:  {}", summary.joined);
    println!("\n💾 CACHE:");
    println!("   Capacity:        {} pages", settings.capacity);
    println!("   Stats:           {}", summary.cache);
    println!("   Purges fired:    {}", summary.purges);

    Ok(())
}

/// Fire the memory-pressure notifier on every SIGUSR1
#[cfg(unix)]
fn watch_pressure_signal(pressure: foliocache::MemoryPressure) -> Result<()> {
    use anyhow::Context;
    use tokio::signal::unix::{signal, SignalKind};

    let mut signals =
        signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;

    tokio::spawn(async move {
        while signals.recv().await.is_some() {
            let purged = pressure.notify();
            info!(purged, "SIGUSR1: memory pressure");
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "foliowarm",
            "--pages",
            "604",
            "--next",
            "3",
            "-C",
            "0",
            "--fail-every",
            "9",
        ]);

        let settings = args.settings().unwrap();

        assert_eq!(settings.pages, 604);
        assert_eq!(settings.next, 3);
        assert_eq!(settings.capacity, 0);
        assert_eq!(settings.fail_every, Some(9));
        assert_eq!(settings.previous, Settings::default().previous);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{ "pages": 50, "readers": 3 }"#).unwrap();

        let args = Args::parse_from([
            "foliowarm",
            "--config",
            path.to_str().unwrap(),
            "--readers",
            "2",
        ]);

        let settings = args.settings().unwrap();

        assert_eq!(settings.pages, 50);
        assert_eq!(settings.readers, 2);
    }
}
