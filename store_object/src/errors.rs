use cache_system::{CacheError, EntityClass};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The hosted data source rejected or failed a write
    #[error("Data source failed to {operation} {class}: {reason}")]
    Source {
        class: EntityClass,
        operation: &'static str,
        reason: anyhow::Error,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("{class} record '{id}' not found")]
    NotFound { class: EntityClass, id: String },
}

impl StoreError {
    pub fn source_failure(class: EntityClass, operation: &'static str, reason: anyhow::Error) -> Self {
        Self::Source {
            class,
            operation,
            reason,
        }
    }

    pub fn not_found(class: EntityClass, id: impl Into<String>) -> Self {
        Self::NotFound {
            class,
            id: id.into(),
        }
    }

    /// True when the underlying fetch or write failed at the data source
    pub fn is_source_failure(&self) -> bool {
        match self {
            Self::Source { .. } => true,
            Self::Cache(err) => err.is_fetch_failure(),
            Self::NotFound { .. } => false,
        }
    }
}
