//! Consumer binding
//!
//! [`CachedQuery`] ties one key, fetcher and TTL together for a presentation
//! layer: last known data, a loading flag and the last error, published on a
//! watch channel. All caching decisions stay in the [`FetchCoordinator`].

use crate::coordinator::FetchCoordinator;
use crate::errors::CacheError;
use crate::key::CacheKey;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

type SharedFetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// Snapshot observed by consumers
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    /// Last known value; kept while refreshing and after failures
    pub data: Option<T>,
    /// True only while a new fetch (not a cache hit) is outstanding
    pub loading: bool,
    pub error: Option<CacheError>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

struct QueryInner<T> {
    coordinator: FetchCoordinator,
    key: CacheKey,
    ttl: Duration,
    fetcher: SharedFetcher<T>,
    state: watch::Sender<QueryState<T>>,
    /// Fetches started by this binding that have not settled yet
    outstanding: AtomicUsize,
}

/// Cached data source for one key; clones share state
pub struct CachedQuery<T> {
    inner: Arc<QueryInner<T>>,
}

impl<T> Clone for CachedQuery<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for CachedQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("CachedQuery")
            .field("key", &self.inner.key.to_string())
            .field("ttl", &self.inner.ttl)
            .field("has_data", &state.data.is_some())
            .field("loading", &state.loading)
            .finish()
    }
}

impl<T> CachedQuery<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(coordinator: FetchCoordinator, key: CacheKey, ttl: Duration, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            inner: Arc::new(QueryInner {
                coordinator,
                key,
                ttl,
                fetcher: Arc::new(move || fetcher().boxed()),
                state,
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.inner.key
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn state(&self) -> QueryState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<CacheError> {
        self.inner.state.borrow().error.clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.inner.state.subscribe()
    }

    /// Serve from cache when fresh, otherwise fetch
    ///
    /// A hit leaves `loading` untouched, so a refetch still running on this
    /// binding keeps reporting it.
    pub async fn load(&self) -> Result<T, CacheError> {
        match self.inner.coordinator.cached::<T>(&self.inner.key) {
            Ok(Some(data)) => {
                self.inner.state.send_modify(|state| apply(state, &Ok(data.clone())));
                Ok(data)
            }
            Ok(None) => self.fetch(false).await,
            Err(err) => {
                self.inner.state.send_modify(|state| state.error = Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Fetch regardless of any fresh entry
    pub async fn refetch(&self) -> Result<T, CacheError> {
        self.fetch(true).await
    }

    /// Evict the key, then refetch
    pub async fn invalidate(&self) -> Result<T, CacheError> {
        self.inner.coordinator.store().delete(&self.inner.key);
        self.refetch().await
    }

    async fn fetch(&self, force_refresh: bool) -> Result<T, CacheError> {
        // counter updates happen under the watch lock so `loading` always agrees with it
        self.inner.state.send_modify(|state| {
            self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
            state.loading = true;
        });
        let pending = Pending::new(&self.inner);

        let fetcher = Arc::clone(&self.inner.fetcher);
        let outcome = self
            .inner
            .coordinator
            .resolve(&self.inner.key, self.inner.ttl, force_refresh, move || fetcher())
            .await;

        pending.settle(&outcome);
        outcome
    }
}

/// One outstanding fetch; released on settle or when the caller drops the future
struct Pending<'a, T> {
    inner: &'a QueryInner<T>,
    released: bool,
}

impl<'a, T: Clone> Pending<'a, T> {
    fn new(inner: &'a QueryInner<T>) -> Self {
        Self { inner, released: false }
    }

    fn settle(mut self, outcome: &Result<T, CacheError>) {
        self.released = true;
        self.inner.state.send_modify(|state| {
            state.loading = release(&self.inner.outstanding);
            apply(state, outcome);
        });
    }
}

impl<T> Drop for Pending<'_, T> {
    fn drop(&mut self) {
        if !self.released {
            self.inner
                .state
                .send_modify(|state| state.loading = release(&self.inner.outstanding));
        }
    }
}

/// Decrement the counter, returning whether fetches remain
fn release(outstanding: &AtomicUsize) -> bool {
    outstanding.fetch_sub(1, Ordering::SeqCst) > 1
}

fn apply<T: Clone>(state: &mut QueryState<T>, outcome: &Result<T, CacheError>) {
    match outcome {
        Ok(data) => {
            state.data = Some(data.clone());
            state.error = None;
        }
        Err(err) => state.error = Some(err.clone()),
    }
}
