//! Error types for cache operations
//!
//! Errors are `Clone` because a single fetch outcome is handed to every
//! caller waiting on the same key.

use std::sync::Arc;
use thiserror::Error;

/// Cache system errors
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The fetcher rejected; `reason` is the fetcher's own error, unchanged
    #[error("Fetch failed for '{key}': {reason}")]
    FetchFailure {
        key: String,
        reason: Arc<anyhow::Error>,
    },

    /// The fetch task ended without producing an outcome (it panicked)
    #[error("Fetch for '{key}' aborted before completing")]
    FetchAborted { key: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown key class: {0}")]
    UnknownKeyClass(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    pub fn fetch_failure(key: impl ToString, reason: anyhow::Error) -> Self {
        CacheError::FetchFailure {
            key: key.to_string(),
            reason: Arc::new(reason),
        }
    }

    /// Fetcher error behind a `FetchFailure`, if this is one
    pub fn fetch_reason(&self) -> Option<&anyhow::Error> {
        match self {
            CacheError::FetchFailure { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, CacheError::FetchFailure { .. })
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}
