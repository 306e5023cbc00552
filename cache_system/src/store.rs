//! In-process cache store
//!
//! Maps [`CacheKey`]s to timestamped JSON snapshots. The store never checks
//! freshness on its own behalf: `get` hands back whatever is present and
//! callers decide with [`CacheEntry::is_fresh`].

use crate::clock::{Clock, add_duration};
use crate::errors::CacheError;
use crate::key::{CacheKey, EntityClass};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Stored value with its validity window
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: serde_json::Value,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Servable without refetch; the expiry instant itself is already stale
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Deserialize a private copy of the stored data
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CacheError> {
        Ok(T::deserialize(&self.data)?)
    }
}

/// Counters since the store was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Key → entry mapping shared by everything in a session
pub struct CacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.len())
            .field("clock", &self.clock)
            .finish()
    }
}

impl CacheStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            counters: Counters::default(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Entry for `key`, fresh or not
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.read().get(key).cloned()
    }

    /// Entry for `key` only if it is still fresh; counts a hit or a miss
    pub fn get_fresh(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = self.now();
        let entry = self.get(key).filter(|entry| entry.is_fresh(now));
        let counter = if entry.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        entry
    }

    /// Store `data` under `key` until `now + ttl`, replacing any previous entry
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: CacheKey,
        data: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(data)?;
        self.set_value(key, value, ttl)
    }

    pub(crate) fn set_value(
        &self,
        key: CacheKey,
        data: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::Configuration(format!(
                "TTL for '{}' must be greater than zero",
                key
            )));
        }

        let stored_at = self.now();
        let entry = CacheEntry {
            data,
            stored_at,
            expires_at: add_duration(stored_at, ttl),
        };
        self.write().insert(key, entry);
        Ok(())
    }

    /// Remove the entry for `key`; returns whether one existed
    pub fn delete(&self, key: &CacheKey) -> bool {
        let removed = self.write().remove(key).is_some();
        if removed {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Lazily evict `key` if its entry has expired; a fresh entry is kept
    pub fn evict_if_stale(&self, key: &CacheKey) -> bool {
        let now = self.now();
        let mut entries = self.write();
        let stale = entries.get(key).is_some_and(|entry| !entry.is_fresh(now));
        if stale {
            entries.remove(key);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
        stale
    }

    /// Remove every entry matching `predicate`; returns the keys removed
    pub fn delete_where<P>(&self, mut predicate: P) -> Vec<CacheKey>
    where
        P: FnMut(&CacheKey, &CacheEntry) -> bool,
    {
        let mut entries = self.write();
        let doomed: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, entry)| predicate(*key, *entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.remove(key);
        }
        drop(entries);

        self.counters
            .evictions
            .fetch_add(doomed.len() as u64, Ordering::Relaxed);
        doomed
    }

    /// Remove every key of `class`
    pub fn delete_class(&self, class: EntityClass) -> Vec<CacheKey> {
        self.delete_where(|key, _| key.class() == class)
    }

    /// Remove entries whose TTL has lapsed
    pub fn purge_expired(&self) -> usize {
        let now = self.now();
        self.delete_where(|_, entry| !entry.is_fresh(now)).len()
    }

    /// Remove everything, e.g. on sign-out
    pub fn clear(&self) {
        let mut entries = self.write();
        let count = entries.len() as u64;
        entries.clear();
        drop(entries);
        self.counters.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn keys_for_class(&self, class: EntityClass) -> Vec<CacheKey> {
        self.read()
            .keys()
            .filter(|key| key.class() == class)
            .cloned()
            .collect()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn store_at(millis: i64) -> (Arc<ManualClock>, CacheStore) {
        let clock = Arc::new(ManualClock::at_millis(millis));
        let store = CacheStore::new(clock.clone());
        (clock, store)
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let (clock, store) = store_at(0);
        let key = CacheKey::list(EntityClass::Suppliers);
        store.set(key.clone(), &json!(["Acme"]), Duration::from_millis(1000)).unwrap();

        clock.set_millis(999);
        assert!(store.get_fresh(&key).is_some());

        clock.set_millis(1000);
        assert!(store.get_fresh(&key).is_none());
        // still present until someone evicts it
        assert!(store.get(&key).is_some());
    }

    #[test]
    fn test_set_overwrites_and_restarts_ttl() {
        let (clock, store) = store_at(0);
        let key = CacheKey::record(EntityClass::Brands, "B1");
        store.set(key.clone(), "Dulux", Duration::from_millis(100)).unwrap();

        clock.set_millis(50);
        store.set(key.clone(), "Dulux Trade", Duration::from_millis(100)).unwrap();

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.decode::<String>().unwrap(), "Dulux Trade");
        assert_eq!(entry.stored_at.timestamp_millis(), 50);
        assert_eq!(entry.expires_at.timestamp_millis(), 150);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let (_, store) = store_at(0);
        let result = store.set(CacheKey::list(EntityClass::Products), &1, Duration::ZERO);
        assert!(matches!(result, Err(CacheError::Configuration(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_, store) = store_at(0);
        let key = CacheKey::list(EntityClass::Customers);
        store.set(key.clone(), &json!([]), Duration::from_secs(1)).unwrap();

        assert!(store.delete(&key));
        assert!(!store.delete(&key));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_delete_class_leaves_other_classes() {
        let (_, store) = store_at(0);
        let ttl = Duration::from_secs(60);
        store.set(CacheKey::list(EntityClass::Suppliers), &json!([]), ttl).unwrap();
        store.set(CacheKey::record(EntityClass::Suppliers, "S1"), &json!({}), ttl).unwrap();
        store.set(CacheKey::list(EntityClass::Products), &json!([]), ttl).unwrap();

        let removed = store.delete_class(EntityClass::Suppliers);

        assert_eq!(removed.len(), 2);
        assert!(store.keys_for_class(EntityClass::Suppliers).is_empty());
        assert!(store.contains(&CacheKey::list(EntityClass::Products)));
    }

    #[test]
    fn test_purge_expired() {
        let (clock, store) = store_at(0);
        store
            .set(CacheKey::list(EntityClass::Invoices), &json!([]), Duration::from_millis(10))
            .unwrap();
        store
            .set(CacheKey::list(EntityClass::Brands), &json!([]), Duration::from_millis(100))
            .unwrap();

        clock.set_millis(10);
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear_and_stats() {
        let (_, store) = store_at(0);
        let key = CacheKey::list(EntityClass::Projects);
        store.set(key.clone(), &json!([1, 2]), Duration::from_secs(5)).unwrap();

        assert!(store.get_fresh(&key).is_some());
        assert!(store.get_fresh(&CacheKey::list(EntityClass::Brands)).is_none());
        store.clear();

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_entries_are_copies() {
        let (_, store) = store_at(0);
        let key = CacheKey::list(EntityClass::Suppliers);
        store.set(key.clone(), &vec!["Acme".to_string()], Duration::from_secs(5)).unwrap();

        let mut copy: Vec<String> = store.get(&key).unwrap().decode().unwrap();
        copy.push("Mutated".to_string());

        let again: Vec<String> = store.get(&key).unwrap().decode().unwrap();
        assert_eq!(again, vec!["Acme".to_string()]);
    }
}
