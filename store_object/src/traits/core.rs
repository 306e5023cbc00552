//! Trait definitions
//!
//! This module defines the core read/write surface of a cached store.

use crate::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait that defines common cached operations for all entities
#[async_trait]
pub trait StoreObject: Clone + Send + Sync + Debug {
    /// The model type that this object represents
    type Model: Clone + Send + Sync + Debug + Serialize + for<'de> Deserialize<'de>;

    /// Create a new instance of this object
    async fn create(&self, data: Self::Model) -> Result<Self::Model, StoreError>;

    /// Get an object by its ID, from cache while fresh
    async fn get_by_id(&self, id: &str) -> Result<Option<Self::Model>, StoreError>;

    /// List all objects of this type, from cache while fresh
    async fn list_all(&self) -> Result<Vec<Self::Model>, StoreError>;

    /// List all objects, bypassing any fresh cache entry
    async fn refresh_all(&self) -> Result<Vec<Self::Model>, StoreError>;

    /// Update an object by its ID
    async fn update(&self, id: &str, data: Self::Model) -> Result<Self::Model, StoreError>;

    /// Delete an object by its ID
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Delete multiple objects by their IDs, returning those that existed
    async fn delete_many(&self, ids: Vec<String>) -> Result<Vec<String>, StoreError>;
}
