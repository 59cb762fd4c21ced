//! # foliofetch
//!
//! Request-coalescing memoization on top of [`foliocache`].
//!
//! ## Layers
//! - **MemoizingService**: at most one concurrent execution per key; every
//!   concurrent caller gets the same outcome; only successes are cached
//! - **PrefetchingService**: after a page resolves, warms a window of
//!   neighbouring pages in detached tasks
//! - **CacheableService**: the trait both implement
//!
//! `invalidate()` clears the cache and detaches in-flight executions without
//! cancelling them: callers already waiting still get their result, new
//! callers start over.

#![warn(missing_docs)]

mod error;
mod memo;
mod multicast;
mod prefetch;
mod service;
mod stats;
mod window;

pub use error::{Error, Result};
pub use memo::{CacheableOperation, MemoizingService};
pub use multicast::MulticastWaiter;
pub use prefetch::PrefetchingService;
pub use service::CacheableService;
pub use stats::FlightStats;
pub use window::PageWindow;
