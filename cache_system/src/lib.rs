//! Cache system for read-mostly domain data
//!
//! This crate provides an in-process, TTL-based cache with de-duplicated
//! fetching and change-driven invalidation.

/// Trace logging that only compiles in with the `debug-logging` feature
#[cfg(feature = "debug-logging")]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod adapter;
pub mod clock;
pub mod coordinator;
pub mod errors;
pub mod key;
pub mod params;
pub mod prelude;
pub mod store;
pub mod trigger;

// Re-export centralized config
pub use config::CacheConfig;

pub use adapter::{CachedQuery, QueryState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::FetchCoordinator;
pub use errors::CacheError;
pub use key::{CacheKey, EntityClass, KeyScope};
pub use params::CacheParams;
pub use store::{CacheEntry, CacheStats, CacheStore};
pub use trigger::{EventOutcome, InvalidationTarget, InvalidationTrigger};
