//! # shopcache
//!
//! Client-side caching for a paint-shop retail tool: an in-process TTL cache
//! for read-mostly data (suppliers, products, brands, customers, invoices,
//! projects), de-duplicated fetching, and invalidation driven by confirmed
//! writes and change notifications.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shopcache::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ShopCache::new(AppConfig::load()?)?;
//!     session.start();
//!
//!     let suppliers = session.query(CacheKey::list(EntityClass::Suppliers), || async {
//!         Ok(vec!["Acme Paints".to_string()])
//!     });
//!
//!     let names: Vec<String> = suppliers.load().await?;
//!     println!("{} suppliers", names.len());
//!
//!     // another client inserted a supplier
//!     session.notify(ChangeEvent::new("suppliers", Operation::Insert));
//!     assert!(session.coordinator().cached::<Vec<String>>(suppliers.key())?.is_none());
//!
//!     session.shutdown();
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use core::ShopCache;
pub use errors::ShopCacheError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, KeyClassConfig, SignalConfig};

// Re-export internal crates used by the public API
pub use cache_system;
pub use signal_system;
pub use store_object;

// Re-export external dependencies used in public API
pub use async_trait;
