//! Generic store implementations
//!
//! Cached reads and write-through invalidation for any [`Entity`].

use super::core::GenericStore;
use crate::errors::StoreError;
use crate::traits::{Entity, Filterable, StoreFilter, StoreObject};
use async_trait::async_trait;
use signal_system::Operation;
use std::sync::Arc;

impl<T: Entity> GenericStore<T> {
    /// Records matching `filter`, cached under a query key of this class
    pub async fn list_where(&self, filter: &StoreFilter) -> Result<Vec<T>, StoreError> {
        let source = Arc::clone(&self.source);
        let owned = filter.clone();
        let records = self
            .coordinator
            .resolve(&self.filter_key(filter), self.get_cache_ttl(), false, move || async move {
                source.fetch_where(&owned).await
            })
            .await?;
        Ok(records)
    }

    async fn read_all(&self, force_refresh: bool) -> Result<Vec<T>, StoreError> {
        let source = Arc::clone(&self.source);
        let records = self
            .coordinator
            .resolve(&self.list_key(), self.get_cache_ttl(), force_refresh, move || async move {
                source.fetch_all().await
            })
            .await?;
        Ok(records)
    }
}

#[async_trait]
impl<T: Entity> StoreObject for GenericStore<T> {
    type Model = T;

    async fn create(&self, data: Self::Model) -> Result<Self::Model, StoreError> {
        let created = self
            .source
            .insert(data)
            .await
            .map_err(|e| self.write_failed("create", e))?;

        self.confirm_write(Operation::Insert, created.id(), Some(&created));
        Ok(created)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Self::Model>, StoreError> {
        let source = Arc::clone(&self.source);
        let owned = id.to_string();
        let record = self
            .coordinator
            .resolve(&self.record_key(id), self.get_cache_ttl(), false, move || async move {
                source.fetch_by_id(&owned).await
            })
            .await?;
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<Self::Model>, StoreError> {
        self.read_all(false).await
    }

    async fn refresh_all(&self) -> Result<Vec<Self::Model>, StoreError> {
        self.read_all(true).await
    }

    async fn update(&self, id: &str, data: Self::Model) -> Result<Self::Model, StoreError> {
        let updated = self
            .source
            .update(id, data)
            .await
            .map_err(|e| self.write_failed("update", e))?
            .ok_or_else(|| StoreError::not_found(T::CLASS, id))?;

        self.confirm_write(Operation::Update, id, Some(&updated));
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let existed = self
            .source
            .delete(id)
            .await
            .map_err(|e| self.write_failed("delete", e))?;

        if existed {
            self.confirm_write(Operation::Delete, id, None);
        }
        Ok(existed)
    }

    async fn delete_many(&self, ids: Vec<String>) -> Result<Vec<String>, StoreError> {
        let mut deleted = Vec::with_capacity(ids.len());
        for id in ids {
            if self.delete(&id).await? {
                deleted.push(id);
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl<T: Entity> Filterable for GenericStore<T> {
    async fn list_by_filter(&self, filter: &StoreFilter) -> Result<Vec<Self::Model>, StoreError> {
        self.list_where(filter).await
    }
}
