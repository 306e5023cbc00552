//! Convenience re-exports for common store-object usage

// Core traits
pub use crate::traits::{DataSource, Entity, Filterable, StoreFilter, StoreObject};

// Error types
pub use crate::errors::StoreError;

// Core store functionality
pub use crate::generic_store::GenericStore;

// Domain records
pub use crate::entities::{
    Brand, Customer, Invoice, InvoiceLine, InvoiceStatus, Product, Project, ProjectStatus,
    Supplier,
};

// Cache params (re-exported from cache_system)
pub use crate::CacheParams;

// Common external dependencies that are frequently used
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
