//! Traits for cached entity stores
//!
//! This module contains the traits that define the interface between the
//! cache, the entity types and the hosted data store.

pub mod core;
pub mod entity;
pub mod filterable;
pub mod source;

// Re-export all public items for convenience
pub use core::StoreObject;
pub use entity::Entity;
pub use filterable::{Filterable, StoreFilter};
pub use source::DataSource;
