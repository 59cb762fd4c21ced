//! Single-flight statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how lookups were served by a memoizing service
#[derive(Debug, Default)]
pub struct FlightStats {
    started: AtomicU64,
    joined: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl FlightStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_joined(&self) {
        self.joined.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome(&self, success: bool) {
        let counter = if success { &self.succeeded } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Executions of the wrapped operation that were launched
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Callers that attached to an execution already in flight
    pub fn joined(&self) -> u64 {
        self.joined.load(Ordering::Relaxed)
    }

    /// Executions that produced a value
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Executions that failed or panicked
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Executions launched but not yet finished, orphaned ones included
    pub fn running(&self) -> u64 {
        self.started()
            .saturating_sub(self.succeeded() + self.failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_counters() {
        let stats = FlightStats::new();

        stats.record_started();
        stats.record_started();
        stats.record_joined();
        stats.record_outcome(true);

        assert_eq!(stats.started(), 2);
        assert_eq!(stats.joined(), 1);
        assert_eq!(stats.succeeded(), 1);
        assert_eq!(stats.failed(), 0);
        assert_eq!(stats.running(), 1);

        stats.record_outcome(false);
        assert_eq!(stats.running(), 0);
    }
}
