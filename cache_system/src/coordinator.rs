//! Fetch coordination
//!
//! Serves fresh entries straight from the [`CacheStore`] and otherwise runs
//! at most one fetch per key, no matter how many callers ask for it at once.

use crate::errors::CacheError;
use crate::key::CacheKey;
use crate::store::CacheStore;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

type FetchOutcome = Result<Arc<serde_json::Value>, CacheError>;
type PendingFetch = Shared<BoxFuture<'static, FetchOutcome>>;

#[derive(Default)]
struct InFlightRegistry {
    pending: Mutex<HashMap<CacheKey, (u64, PendingFetch)>>,
    next_id: AtomicU64,
}

impl InFlightRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, (u64, PendingFetch)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes its registration when dropped, including on panic
struct Registration {
    registry: Arc<InFlightRegistry>,
    key: CacheKey,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut pending = self.registry.lock();
        if pending.get(&self.key).is_some_and(|(id, _)| *id == self.id) {
            pending.remove(&self.key);
        }
    }
}

/// De-duplicating read-through access to a [`CacheStore`]
#[derive(Clone)]
pub struct FetchCoordinator {
    store: Arc<CacheStore>,
    in_flight: Arc<InFlightRegistry>,
}

impl Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("store", &self.store)
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

impl FetchCoordinator {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self {
            store,
            in_flight: Arc::new(InFlightRegistry::default()),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Fresh cached data for `key`, without fetching
    pub fn cached<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, CacheError> {
        self.store
            .get_fresh(key)
            .map(|entry| entry.decode())
            .transpose()
    }

    /// Resolve `key`, fetching at most once across concurrent callers
    ///
    /// A fresh entry is returned without suspending unless `force_refresh`
    /// is set. Forced and unforced callers share any fetch already in flight.
    /// A failed fetch leaves the store untouched and reaches every waiter.
    pub async fn resolve<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        force_refresh: bool,
        fetcher: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        if ttl.is_zero() {
            return Err(CacheError::Configuration(format!(
                "TTL for '{}' must be greater than zero",
                key
            )));
        }

        if !force_refresh {
            if let Some(entry) = self.store.get_fresh(key) {
                trace_log!("cache hit for '{}'", key);
                return entry.decode();
            }
            if self.store.evict_if_stale(key) {
                trace_log!("evicted expired entry for '{}'", key);
            }
        }

        let value = self.join_or_start(key, ttl, fetcher).await?;
        Ok(T::deserialize(&*value)?)
    }

    /// Whether a fetch for `key` is currently outstanding
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.lock().contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn join_or_start<T, F, Fut>(&self, key: &CacheKey, ttl: Duration, fetcher: F) -> PendingFetch
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (sender, registration, pending) = {
            let mut in_flight = self.in_flight.lock();
            if let Some((_, pending)) = in_flight.get(key) {
                trace_log!("joining in-flight fetch for '{}'", key);
                return pending.clone();
            }

            let id = self.in_flight.next_id.fetch_add(1, Ordering::Relaxed);
            let (sender, receiver) = oneshot::channel::<FetchOutcome>();
            let key_name = key.to_string();
            let pending = async move {
                receiver
                    .await
                    .unwrap_or(Err(CacheError::FetchAborted { key: key_name }))
            }
            .boxed()
            .shared();

            in_flight.insert(key.clone(), (id, pending.clone()));
            let registration = Registration {
                registry: self.in_flight.clone(),
                key: key.clone(),
                id,
            };
            (sender, registration, pending)
        };

        // Invoked outside the lock: the fetcher is caller code.
        let fetch = fetcher();
        let store = self.store.clone();
        let key = key.clone();
        tracing::debug!("starting fetch for '{}'", key);

        // Detached: the fetch completes even if every caller stops waiting.
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = match fetch.await {
                Ok(data) => store_result(&store, &key, &data, ttl),
                Err(reason) => Err(CacheError::fetch_failure(&key, reason)),
            };
            match &outcome {
                Ok(_) => tracing::debug!("fetched '{}' in {:?}", key, started.elapsed()),
                Err(err) => tracing::debug!("fetch for '{}' failed: {}", key, err),
            }

            drop(registration);
            let _ = sender.send(outcome);
        });

        pending
    }
}

fn store_result<T: Serialize>(
    store: &CacheStore,
    key: &CacheKey,
    data: &T,
    ttl: Duration,
) -> FetchOutcome {
    let value = serde_json::to_value(data)?;
    store.set_value(key.clone(), value.clone(), ttl)?;
    Ok(Arc::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::key::EntityClass;
    use serde::Deserialize;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Supplier {
        id: String,
        name: String,
    }

    fn acme() -> Vec<Supplier> {
        vec![Supplier {
            id: "S1".to_string(),
            name: "Acme".to_string(),
        }]
    }

    fn setup() -> (Arc<ManualClock>, FetchCoordinator) {
        let clock = Arc::new(ManualClock::at_millis(0));
        let store = Arc::new(CacheStore::new(clock.clone()));
        (clock, FetchCoordinator::new(store))
    }

    fn counting_fetcher(
        calls: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> BoxFuture<'static, anyhow::Result<Vec<Supplier>>> {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::task::yield_now().await;
                Ok(acme())
            }
            .boxed()
        }
    }

    fn failing_fetcher(
        calls: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> BoxFuture<'static, anyhow::Result<Vec<Supplier>>> {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(anyhow::anyhow!("store unreachable")) }.boxed()
        }
    }

    const TTL: Duration = Duration::from_millis(1000);

    async fn panicking_fetch() -> anyhow::Result<Vec<Supplier>> {
        panic!("fetcher bug")
    }

    #[tokio::test]
    async fn test_second_resolve_is_a_cache_hit() {
        let (clock, coordinator) = setup();
        let key = CacheKey::list(EntityClass::Suppliers);
        let calls = Arc::new(AtomicUsize::new(0));

        let first: Vec<Supplier> = coordinator
            .resolve(&key, TTL, false, counting_fetcher(&calls))
            .await
            .unwrap();
        clock.set_millis(500);
        let second: Vec<Supplier> = coordinator
            .resolve(&key, TTL, false, counting_fetcher(&calls))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_fetch() {
        let (_, coordinator) = setup();
        let key = CacheKey::list(EntityClass::Suppliers);
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            coordinator.resolve::<Vec<Supplier>, _, _>(&key, TTL, false, counting_fetcher(&calls)),
            coordinator.resolve::<Vec<Supplier>, _, _>(&key, TTL, false, counting_fetcher(&calls)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert!(!coordinator.is_in_flight(&key));
    }

    #[tokio::test]
    async fn test_forced_and_unforced_callers_share_fetch() {
        let (_, coordinator) = setup();
        let key = CacheKey::list(EntityClass::Suppliers);
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            coordinator.resolve::<Vec<Supplier>, _, _>(&key, TTL, true, counting_fetcher(&calls)),
            coordinator.resolve::<Vec<Supplier>, _, _>(&key, TTL, false, counting_fetcher(&calls)),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expiry_boundary_triggers_refetch() {
        let (clock, coordinator) = setup();
        let key = CacheKey::list(EntityClass::Suppliers);
        let calls = Arc::new(AtomicUsize::new(0));

        let _: Vec<Supplier> = coordinator
            .resolve(&key, TTL, false, counting_fetcher(&calls))
            .await
            .unwrap();

        clock.set_millis(999);
        let _: Vec<Supplier> = coordinator
            .resolve(&key, TTL, false, counting_fetcher(&calls))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.set_millis(1000);
        let _: Vec<Supplier> = coordinator
            .resolve(&key, TTL, false, counting_fetcher(&calls))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_fresh_entry() {
        let (_, coordinator) = setup();
        let key = CacheKey::list(EntityClass::Products);
        let calls = Arc::new(AtomicUsize::new(0));

        let _: Vec<Supplier> = coordinator
            .resolve(&key, TTL, false, counting_fetcher(&calls))
            .await
            .unwrap();
        let _: Vec<Supplier> = coordinator
            .resolve(&key, TTL, true, counting_fetcher(&calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_valid_entry() {
        let (clock, coordinator) = setup();
        let key = CacheKey::list(EntityClass::Suppliers);
        let calls = Arc::new(AtomicUsize::new(0));

        let _: Vec<Supplier> = coordinator
            .resolve(&key, TTL, false, counting_fetcher(&calls))
            .await
            .unwrap();
        let before = coordinator.store().get(&key).unwrap();

        clock.set_millis(100);
        let err = coordinator
            .resolve::<Vec<Supplier>, _, _>(&key, TTL, true, failing_fetcher(&calls))
            .await
            .unwrap_err();
        assert!(err.is_fetch_failure());
        assert_eq!(err.fetch_reason().unwrap().to_string(), "store unreachable");

        assert_eq!(coordinator.store().get(&key).unwrap(), before);
        let again: Vec<Supplier> = coordinator
            .resolve(&key, TTL, false, failing_fetcher(&calls))
            .await
            .unwrap();
        assert_eq!(again, acme());
        // the unforced call above was served from cache
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter_and_writes_nothing() {
        let (_, coordinator) = setup();
        let key = CacheKey::list(EntityClass::Brands);
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            coordinator.resolve::<Vec<Supplier>, _, _>(&key, TTL, false, failing_fetcher(&calls)),
            coordinator.resolve::<Vec<Supplier>, _, _>(&key, TTL, false, counting_fetcher(&calls)),
        );

        assert!(a.unwrap_err().is_fetch_failure());
        assert!(b.unwrap_err().is_fetch_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.store().get(&key).is_none());
        assert!(!coordinator.is_in_flight(&key));
    }

    #[tokio::test]
    async fn test_fetch_completes_after_caller_gives_up() {
        let (_, coordinator) = setup();
        let key = CacheKey::list(EntityClass::Customers);
        let (release, gate) = oneshot::channel::<()>();

        let abandoned = coordinator.resolve::<Vec<Supplier>, _, _>(&key, TTL, false, move || async move {
            let _ = gate.await;
            Ok(acme())
        });
        // poll once so the fetch is registered, then drop the caller
        assert!(abandoned.now_or_never().is_none());
        assert!(coordinator.is_in_flight(&key));

        release.send(()).unwrap();
        while coordinator.is_in_flight(&key) {
            tokio::task::yield_now().await;
        }

        let cached: Option<Vec<Supplier>> = coordinator.cached(&key).unwrap();
        assert_eq!(cached, Some(acme()));
    }

    #[tokio::test]
    async fn test_zero_ttl_is_a_configuration_error() {
        let (_, coordinator) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let err = coordinator
            .resolve::<Vec<Supplier>, _, _>(
                &CacheKey::list(EntityClass::Projects),
                Duration::ZERO,
                false,
                counting_fetcher(&calls),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Configuration(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_fetch_is_reported_and_deregistered() {
        let (_, coordinator) = setup();
        let key = CacheKey::list(EntityClass::Invoices);

        let err = coordinator
            .resolve(&key, TTL, false, panicking_fetch)
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::FetchAborted { .. }));
        assert!(!coordinator.is_in_flight(&key));
    }
}
