//! Core session functionality
//!
//! This module contains the [`ShopCache`] session, which owns the cache store,
//! the fetch coordinator, the invalidation trigger and the change feed for one
//! signed-in user.

use cache_system::{
    CacheKey, CacheParams, CacheStats, CacheStore, CachedQuery, Clock, EventOutcome,
    FetchCoordinator, InvalidationTarget, InvalidationTrigger, SystemClock,
};
use config::AppConfig;
use serde::Serialize;
use serde::de::DeserializeOwned;
use signal_system::{ChangeEvent, SignalManager};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use store_object::{DataSource, Entity, GenericStore};
use tokio::task::JoinHandle;

use crate::errors::ShopCacheError;

/// Cache session shared by every view of the application
pub struct ShopCache {
    config: AppConfig,
    cache: Arc<CacheStore>,
    coordinator: FetchCoordinator,
    trigger: Arc<InvalidationTrigger>,
    signals: Arc<SignalManager>,
    stores: HashMap<cache_system::EntityClass, Box<dyn Any + Send + Sync>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for ShopCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopCache")
            .field("cache", &self.cache)
            .field("signals", &self.signals)
            .field("stores", &self.stores.keys().collect::<Vec<_>>())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ShopCache {
    /// Create a session on the system clock
    pub fn new(config: AppConfig) -> Result<Self, ShopCacheError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a session reading time from `clock`
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self, ShopCacheError> {
        config.validate()?;
        let params = Arc::new(CacheParams::from_config(&config.cache)?);

        let cache = Arc::new(CacheStore::new(clock));
        let coordinator = FetchCoordinator::new(Arc::clone(&cache));
        let trigger = Arc::new(InvalidationTrigger::new(
            Arc::clone(&cache),
            params,
            config.signal.dedup_window,
        ));
        let signals = Arc::new(SignalManager::new(config.signal.clone()));

        Ok(Self {
            config,
            cache,
            coordinator,
            trigger,
            signals,
            stores: HashMap::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start the invalidation listener and, if configured, the expiry sweeper
    ///
    /// Must run inside a tokio runtime. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut tasks = self.lock_tasks();
        if !tasks.is_empty() {
            return;
        }

        tasks.push(self.trigger.listen(self.signals.subscribe()));

        if let Some(period) = self.config.cache.sweep_interval() {
            let cache = Arc::clone(&self.cache);
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let purged = cache.purge_expired();
                    if purged > 0 {
                        tracing::debug!("swept {} expired cache entries", purged);
                    }
                }
            }));
        }

        tracing::info!(
            "cache session started with {} background task(s)",
            tasks.len()
        );
    }

    pub fn is_running(&self) -> bool {
        self.lock_tasks().iter().any(|task| !task.is_finished())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    pub fn trigger(&self) -> &Arc<InvalidationTrigger> {
        &self.trigger
    }

    pub fn signals(&self) -> &Arc<SignalManager> {
        &self.signals
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Consumer binding for `key`, using the TTL of the key's class
    pub fn query<T, F, Fut>(&self, key: CacheKey, fetcher: F) -> CachedQuery<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let ttl = self.trigger.params().ttl(key.class());
        CachedQuery::new(self.coordinator.clone(), key, ttl, fetcher)
    }

    /// Cached store for `T` backed by `source`, wired to this session
    pub fn store<T: Entity>(&self, source: Arc<dyn DataSource<T>>) -> GenericStore<T> {
        GenericStore::new(
            source,
            self.coordinator.clone(),
            Arc::clone(&self.trigger),
            Some(Arc::clone(&self.signals)),
        )
    }

    /// Build and keep the store for `T` so views can look it up later
    pub fn register_store<T: Entity>(
        &mut self,
        source: Arc<dyn DataSource<T>>,
    ) -> Result<GenericStore<T>, ShopCacheError> {
        if self.stores.contains_key(&T::CLASS) {
            return Err(ShopCacheError::StoreAlreadyRegistered(T::CLASS));
        }

        let store = self.store(source);
        self.stores.insert(T::CLASS, Box::new(store.clone()));
        debug_log!("registered store for {}", T::CLASS);
        Ok(store)
    }

    /// Get the registered store for `T`
    pub fn get_store<T: Entity>(&self) -> Result<GenericStore<T>, ShopCacheError> {
        self.stores
            .get(&T::CLASS)
            .and_then(|store| store.downcast_ref::<GenericStore<T>>())
            .cloned()
            .ok_or(ShopCacheError::StoreNotFound(T::CLASS))
    }

    /// Handle a change notification delivered from outside this client
    ///
    /// The event is applied immediately and then published on the feed for
    /// other subscribers; the listener recognises it as already handled.
    pub fn notify(&self, event: ChangeEvent) -> EventOutcome {
        let outcome = self.trigger.process(&event);
        trace_log!("external {} on '{}': {:?}", event.operation, event.entity_class, outcome);
        if !matches!(outcome, EventOutcome::Duplicate) && self.signals.subscriber_count() > 0 {
            let _ = self.signals.emit(event);
        }
        outcome
    }

    pub fn invalidate(&self, target: InvalidationTarget) -> usize {
        self.trigger.invalidate(target)
    }

    /// Drop every cached entry, e.g. when the user signs out
    pub fn sign_out(&self) {
        let evicted = self.trigger.invalidate(InvalidationTarget::All);
        tracing::info!("signed out, {} cache entries dropped", evicted);
    }

    /// Stop background tasks and clear the cache
    pub fn shutdown(&self) {
        self.abort_tasks();
        self.cache.clear();
        tracing::info!("cache session shut down");
    }

    fn abort_tasks(&self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ShopCache {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}
