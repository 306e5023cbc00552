//! Convenience re-exports for common shopcache usage
//!
//! This prelude module re-exports the most commonly used items from the
//! member crates, making it easier to import everything you need with a
//! single use statement.
//!
//! # Example
//!
//! ```rust
//! use shopcache::prelude::*;
//!
//! // Now you have access to the session, keys, stores and change events
//! ```

// Core session components
pub use crate::core::ShopCache;
pub use crate::errors::ShopCacheError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, ConfigError, KeyClassConfig, SignalConfig};

// Re-export commonly used store-object types for convenience
pub use store_object::prelude::*;

// Re-export signal system for event handling
pub use signal_system::prelude::*;

// Re-export cache system
pub use cache_system::prelude::*;

// Common external dependencies
pub use anyhow;
pub use async_trait;
pub use tokio;
