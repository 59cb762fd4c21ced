//! # foliocache
//!
//! Thread-safe bounded in-memory cache for Folio.
//!
//! ## Architecture
//! - **HashMap**: AHash keyed store behind a single mutex
//! - **Limits**: optional soft count and total-cost limits, unordered eviction
//! - **Memory pressure**: explicit notifier that purges registered caches
//!
//! Eviction victims are unspecified. Callers may only rely on limits being
//! approximately respected and on the most recently inserted key surviving
//! its own insertion.

#![warn(missing_docs)]

mod cache;
mod pressure;
mod stats;

pub use cache::{Cache, CacheConfig};
pub use pressure::MemoryPressure;
pub use stats::{CacheStats, StatsSnapshot};
