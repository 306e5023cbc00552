//! Convenience re-exports for common cache-system usage

// Core cache system components
pub use crate::adapter::{CachedQuery, QueryState};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::coordinator::FetchCoordinator;
pub use crate::errors::CacheError;
pub use crate::key::{CacheKey, EntityClass, KeyScope};
pub use crate::params::CacheParams;
pub use crate::store::{CacheEntry, CacheStats, CacheStore};
pub use crate::trigger::{EventOutcome, InvalidationTarget, InvalidationTrigger};

// Re-export centralized config
pub use config::CacheConfig;

// Common external dependencies
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;
