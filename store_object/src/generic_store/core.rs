use crate::errors::StoreError;
use crate::traits::{DataSource, Entity, StoreFilter};
use cache_system::{CacheKey, CachedQuery, FetchCoordinator, InvalidationTrigger};
use signal_system::{Operation, SignalManager};
use std::sync::Arc;
use std::time::Duration;

/// Generic cached store over one entity type
///
/// Reads go through the session's [`FetchCoordinator`]; confirmed writes
/// invalidate through the [`InvalidationTrigger`] and are published on the
/// signal manager when one is attached.
pub struct GenericStore<T: Entity> {
    pub(crate) source: Arc<dyn DataSource<T>>,
    pub(crate) coordinator: FetchCoordinator,
    pub(crate) trigger: Arc<InvalidationTrigger>,
    pub(crate) signal_manager: Option<Arc<SignalManager>>,
    pub(crate) cache_ttl: Option<Duration>, // Custom TTL for this store
}

impl<T: Entity> Clone for GenericStore<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            coordinator: self.coordinator.clone(),
            trigger: Arc::clone(&self.trigger),
            signal_manager: self.signal_manager.clone(),
            cache_ttl: self.cache_ttl,
        }
    }
}

impl<T: Entity> std::fmt::Debug for GenericStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericStore")
            .field("class", &T::CLASS)
            .field("has_signals", &self.has_signals())
            .field("cache_ttl", &self.get_cache_ttl())
            .finish()
    }
}

impl<T: Entity> GenericStore<T> {
    pub fn new(
        source: Arc<dyn DataSource<T>>,
        coordinator: FetchCoordinator,
        trigger: Arc<InvalidationTrigger>,
        signal_manager: Option<Arc<SignalManager>>,
    ) -> Self {
        Self {
            source,
            coordinator,
            trigger,
            signal_manager,
            cache_ttl: None,
        }
    }

    /// Override the class TTL for this store only
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Set signal manager for this store
    pub fn set_signal_manager(&mut self, signal_manager: Arc<SignalManager>) {
        self.signal_manager = Some(signal_manager);
    }

    /// Remove signal manager from this store
    pub fn remove_signal_manager(&mut self) {
        self.signal_manager = None;
    }

    /// Check if signal manager is set
    pub fn has_signals(&self) -> bool {
        self.signal_manager.is_some()
    }

    /// Get effective cache TTL (custom or the class TTL)
    pub fn get_cache_ttl(&self) -> Duration {
        self.cache_ttl
            .unwrap_or_else(|| self.trigger.params().ttl(T::CLASS))
    }

    pub fn list_key(&self) -> CacheKey {
        CacheKey::list(T::CLASS)
    }

    pub fn record_key(&self, id: &str) -> CacheKey {
        CacheKey::record(T::CLASS, id)
    }

    pub fn filter_key(&self, filter: &StoreFilter) -> CacheKey {
        CacheKey::query(T::CLASS, filter)
    }

    /// Consumer binding for the full list of this class
    pub fn list_query(&self) -> CachedQuery<Vec<T>> {
        let source = Arc::clone(&self.source);
        CachedQuery::new(
            self.coordinator.clone(),
            self.list_key(),
            self.get_cache_ttl(),
            move || {
                let source = Arc::clone(&source);
                async move { source.fetch_all().await }
            },
        )
    }

    /// Consumer binding for one record of this class
    pub fn record_query(&self, id: &str) -> CachedQuery<Option<T>> {
        let source = Arc::clone(&self.source);
        let id = id.to_string();
        CachedQuery::new(
            self.coordinator.clone(),
            self.record_key(&id),
            self.get_cache_ttl(),
            move || {
                let source = Arc::clone(&source);
                let id = id.clone();
                async move { source.fetch_by_id(&id).await }
            },
        )
    }

    /// Invalidate after a confirmed write and publish the change
    pub(crate) fn confirm_write(&self, operation: Operation, id: &str, record: Option<&T>) {
        let mut event = self.trigger.on_local_write(T::CLASS, operation, Some(id));
        debug_log!("confirmed {} of {} '{}'", operation, T::CLASS, id);

        if let Some(signal_manager) = &self.signal_manager {
            if let Some(payload) = record.and_then(|r| serde_json::to_value(r).ok()) {
                event = event.with_payload(payload);
            }
            // emit already logs the no-subscriber case
            let _ = signal_manager.emit(event);
        }
    }

    /// Wrap a data-source write failure; the cache is left untouched
    pub(crate) fn write_failed(&self, operation: &'static str, reason: anyhow::Error) -> StoreError {
        tracing::warn!("{} on {} failed at the data source: {:#}", operation, T::CLASS, reason);
        StoreError::source_failure(T::CLASS, operation, reason)
    }
}
