//! Error types for the shopcache crate
//!
//! This module contains all error types that can be returned by session operations.

use cache_system::{CacheError, EntityClass};
use config::ConfigError;
use store_object::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShopCacheError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No store registered for {0}")]
    StoreNotFound(EntityClass),

    #[error("Store already registered for {0}")]
    StoreAlreadyRegistered(EntityClass),
}
