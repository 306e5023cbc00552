//! Invalidation trigger
//!
//! Translates confirmed local writes and change notifications into evictions.
//! Eviction only removes entries; the next `resolve` repopulates them. A
//! fetch already in flight is not cancelled and still writes its result.

use crate::key::{CacheKey, EntityClass};
use crate::params::CacheParams;
use crate::store::CacheStore;
use signal_system::{ChangeEvent, Operation};
use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// What to evict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationTarget {
    /// Exactly one key
    Key(CacheKey),
    /// One record: its record key, the lists and queries of its class, and
    /// every key of classes derived from it
    Record { class: EntityClass, id: String },
    /// Every key of a class and of classes derived from it
    Class(EntityClass),
    All,
}

/// Result of handling one change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Number of entries evicted (possibly zero)
    Evicted(usize),
    /// Event id already handled inside the dedup window
    Duplicate,
    /// Entity class not cached by this session
    Ignored,
}

/// Bounded memory of handled event ids
#[derive(Debug)]
struct RecentEvents {
    order: VecDeque<Uuid>,
    ids: HashSet<Uuid>,
    capacity: usize,
}

impl RecentEvents {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns false if `id` was already recorded
    fn record(&mut self, id: Uuid) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }
}

pub struct InvalidationTrigger {
    store: Arc<CacheStore>,
    params: Arc<CacheParams>,
    recent: Mutex<RecentEvents>,
}

impl Debug for InvalidationTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationTrigger")
            .field("params", &self.params)
            .finish()
    }
}

impl InvalidationTrigger {
    pub fn new(store: Arc<CacheStore>, params: Arc<CacheParams>, dedup_window: usize) -> Self {
        Self {
            store,
            params,
            recent: Mutex::new(RecentEvents::new(dedup_window)),
        }
    }

    pub fn params(&self) -> &CacheParams {
        &self.params
    }

    /// Evict `target`; returns the number of entries removed
    pub fn invalidate(&self, target: InvalidationTarget) -> usize {
        let evicted = match &target {
            InvalidationTarget::Key(key) => usize::from(self.store.delete(key)),
            InvalidationTarget::Record { class, id } => {
                let dependents = self.params.dependents_of(*class);
                self.store
                    .delete_where(|key, _| {
                        if key.class() == *class {
                            key.record_id().is_none_or(|record_id| record_id == id.as_str())
                        } else {
                            dependents.contains(&key.class())
                        }
                    })
                    .len()
            }
            InvalidationTarget::Class(class) => {
                let dependents = self.params.dependents_of(*class);
                self.store
                    .delete_where(|key, _| {
                        key.class() == *class || dependents.contains(&key.class())
                    })
                    .len()
            }
            InvalidationTarget::All => {
                let count = self.store.len();
                self.store.clear();
                count
            }
        };

        tracing::debug!("invalidated {:?}: {} entries evicted", target, evicted);
        evicted
    }

    /// Evict what a confirmed local write affects
    ///
    /// Returns the change event describing the write, already marked as
    /// handled so that publishing it does not evict twice.
    pub fn on_local_write(
        &self,
        class: EntityClass,
        operation: Operation,
        record_id: Option<&str>,
    ) -> ChangeEvent {
        let mut event = ChangeEvent::new(class.as_str(), operation);
        if let Some(id) = record_id {
            event = event.with_record_id(id);
        }

        self.remember(event.event_id);
        self.invalidate(target_for(class, event.record_id.as_deref()));
        event
    }

    /// Handle one change notification
    ///
    /// Eviction is idempotent and order-insensitive, so redelivered or
    /// reordered events never leave the cache in a different state.
    pub fn process(&self, event: &ChangeEvent) -> EventOutcome {
        let Ok(class) = event.entity_class.parse::<EntityClass>() else {
            tracing::debug!(
                "ignoring {} change for uncached entity class '{}'",
                event.operation,
                event.entity_class
            );
            return EventOutcome::Ignored;
        };

        if !self.remember(event.event_id) {
            trace_log!("dropping duplicate event {}", event.event_id);
            return EventOutcome::Duplicate;
        }

        EventOutcome::Evicted(self.invalidate(target_for(class, event.record_id.as_deref())))
    }

    /// Consume a change feed on a background task until it closes
    ///
    /// A lagging receiver has lost events it can no longer identify, so the
    /// whole cache is evicted.
    pub fn listen(self: &Arc<Self>, mut receiver: broadcast::Receiver<ChangeEvent>) -> JoinHandle<()> {
        let trigger = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        trigger.process(&event);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(
                            "change feed lagged by {} events, evicting entire cache",
                            missed
                        );
                        trigger.invalidate(InvalidationTarget::All);
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("change feed closed, invalidation listener stopping");
                        break;
                    }
                }
            }
        })
    }

    fn remember(&self, event_id: Uuid) -> bool {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(event_id)
    }
}

fn target_for(class: EntityClass, record_id: Option<&str>) -> InvalidationTarget {
    match record_id {
        Some(id) => InvalidationTarget::Record {
            class,
            id: id.to_string(),
        },
        None => InvalidationTarget::Class(class),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use signal_system::{SignalConfig, SignalManager};
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(60);

    fn setup() -> (Arc<CacheStore>, Arc<InvalidationTrigger>) {
        let store = Arc::new(CacheStore::new(Arc::new(ManualClock::default())));
        let params = CacheParams::new(TTL)
            .unwrap()
            .with_dependency(EntityClass::Products, EntityClass::Brands);
        let trigger = Arc::new(InvalidationTrigger::new(store.clone(), Arc::new(params), 4));
        (store, trigger)
    }

    fn seed(store: &CacheStore, keys: &[CacheKey]) {
        for key in keys {
            store.set(key.clone(), &json!({}), TTL).unwrap();
        }
    }

    #[test]
    fn test_record_change_keeps_sibling_records() {
        let (store, trigger) = setup();
        let s1 = CacheKey::record(EntityClass::Suppliers, "S1");
        let s2 = CacheKey::record(EntityClass::Suppliers, "S2");
        let list = CacheKey::list(EntityClass::Suppliers);
        let query = CacheKey::query(EntityClass::Suppliers, "city=Leeds");
        seed(&store, &[s1.clone(), s2.clone(), list.clone(), query.clone()]);

        let evicted = trigger.invalidate(InvalidationTarget::Record {
            class: EntityClass::Suppliers,
            id: "S1".to_string(),
        });

        assert_eq!(evicted, 3);
        assert!(store.contains(&s2));
        assert!(!store.contains(&s1) && !store.contains(&list) && !store.contains(&query));
    }

    #[test]
    fn test_class_change_reaches_derived_classes() {
        let (store, trigger) = setup();
        let brands = CacheKey::list(EntityClass::Brands);
        let products = CacheKey::list(EntityClass::Products);
        let product = CacheKey::record(EntityClass::Products, "P1");
        let customers = CacheKey::list(EntityClass::Customers);
        seed(&store, &[brands, products, product, customers.clone()]);

        trigger.invalidate(InvalidationTarget::Class(EntityClass::Brands));

        assert_eq!(store.len(), 1);
        assert!(store.contains(&customers));
    }

    #[test]
    fn test_derived_class_change_does_not_flow_back() {
        let (store, trigger) = setup();
        let brands = CacheKey::list(EntityClass::Brands);
        seed(&store, &[brands.clone(), CacheKey::list(EntityClass::Products)]);

        trigger.invalidate(InvalidationTarget::Class(EntityClass::Products));
        assert!(store.contains(&brands));
    }

    #[test]
    fn test_process_external_event() {
        let (store, trigger) = setup();
        seed(&store, &[CacheKey::list(EntityClass::Suppliers)]);

        let event = ChangeEvent::new("suppliers", Operation::Insert);
        assert_eq!(trigger.process(&event), EventOutcome::Evicted(1));
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_events_are_skipped() {
        let (store, trigger) = setup();
        let event = ChangeEvent::new("customers", Operation::Update).with_record_id("C1");

        assert_eq!(trigger.process(&event), EventOutcome::Evicted(0));
        seed(&store, &[CacheKey::list(EntityClass::Customers)]);
        assert_eq!(trigger.process(&event), EventOutcome::Duplicate);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_dedup_window_is_bounded() {
        let (_, trigger) = setup();
        let first = ChangeEvent::new("brands", Operation::Update);
        trigger.process(&first);
        for _ in 0..4 {
            trigger.process(&ChangeEvent::new("brands", Operation::Update));
        }

        // pushed out of the window, so handled again
        assert_eq!(trigger.process(&first), EventOutcome::Evicted(0));
    }

    #[test]
    fn test_unknown_entity_class_is_ignored() {
        let (store, trigger) = setup();
        seed(&store, &[CacheKey::list(EntityClass::Suppliers)]);

        let event = ChangeEvent::new("audit_log", Operation::Insert);
        assert_eq!(trigger.process(&event), EventOutcome::Ignored);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_local_write_marks_event_handled() {
        let (store, trigger) = setup();
        seed(&store, &[CacheKey::record(EntityClass::Brands, "B1")]);

        let event = trigger.on_local_write(EntityClass::Brands, Operation::Delete, Some("B1"));

        assert!(store.is_empty());
        assert_eq!(event.record_id.as_deref(), Some("B1"));
        assert_eq!(event.operation, Operation::Delete);
        assert_eq!(trigger.process(&event), EventOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_listener_processes_feed_until_closed() {
        let (store, trigger) = setup();
        let signals = SignalManager::new(SignalConfig::new(8, 8));
        let handle = trigger.listen(signals.subscribe());
        seed(&store, &[CacheKey::list(EntityClass::Suppliers)]);

        signals.emit(ChangeEvent::new("suppliers", Operation::Insert)).unwrap();
        while !store.is_empty() {
            tokio::task::yield_now().await;
        }

        drop(signals);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_lagging_listener_evicts_everything() {
        let (store, trigger) = setup();
        let signals = SignalManager::new(SignalConfig::new(1, 8));
        let receiver = signals.subscribe();
        seed(&store, &[CacheKey::list(EntityClass::Customers)]);

        // overflow the receiver before the listener starts draining it
        signals.emit(ChangeEvent::new("brands", Operation::Update)).unwrap();
        signals.emit(ChangeEvent::new("brands", Operation::Update)).unwrap();

        let handle = trigger.listen(receiver);
        drop(signals);
        handle.await.unwrap();

        assert!(store.is_empty());
    }
}
