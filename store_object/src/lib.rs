//! Store Object - cached entity stores for the shop client
//!
//! This crate provides the paint-shop entity types, the boundary trait to the
//! hosted data store and a generic store that reads through the cache and
//! invalidates on confirmed writes.

/// Debug logging that only compiles in with the `debug-logging` feature
#[cfg(feature = "debug-logging")]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

pub mod entities;
pub mod errors;
pub mod generic_store;
pub mod prelude;
pub mod traits;

pub use cache_system::CacheParams;
pub use entities::{
    Brand, Customer, Invoice, InvoiceLine, InvoiceStatus, Product, Project, ProjectStatus,
    Supplier,
};
pub use errors::StoreError;
pub use generic_store::GenericStore;
pub use traits::*;
