//! Hosted data store boundary
//!
//! Implementations talk to the remote relational store. Every method reports
//! failures as `anyhow::Error` so the cache can carry the verbatim cause to
//! each waiter.

use super::entity::Entity;
use super::filterable::StoreFilter;
use async_trait::async_trait;

#[async_trait]
pub trait DataSource<T: Entity>: Send + Sync + 'static {
    async fn fetch_all(&self) -> anyhow::Result<Vec<T>>;

    async fn fetch_by_id(&self, id: &str) -> anyhow::Result<Option<T>>;

    async fn fetch_where(&self, filter: &StoreFilter) -> anyhow::Result<Vec<T>>;

    /// Insert a record and return it as stored
    async fn insert(&self, record: T) -> anyhow::Result<T>;

    /// Replace the record with `id`; `None` when it does not exist
    async fn update(&self, id: &str, record: T) -> anyhow::Result<Option<T>>;

    /// Remove the record with `id`; returns whether it existed
    async fn delete(&self, id: &str) -> anyhow::Result<bool>;
}
