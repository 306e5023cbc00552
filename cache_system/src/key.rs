//! Typed cache keys
//!
//! Every key belongs to exactly one [`EntityClass`], which is what lets the
//! invalidation trigger enumerate all keys derived from a class.

use crate::errors::CacheError;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Cached entity classes, named after their backing tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityClass {
    Suppliers,
    Products,
    Brands,
    Customers,
    Invoices,
    Projects,
}

impl EntityClass {
    pub const ALL: [EntityClass; 6] = [
        EntityClass::Suppliers,
        EntityClass::Products,
        EntityClass::Brands,
        EntityClass::Customers,
        EntityClass::Invoices,
        EntityClass::Projects,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::Suppliers => "suppliers",
            EntityClass::Products => "products",
            EntityClass::Brands => "brands",
            EntityClass::Customers => "customers",
            EntityClass::Invoices => "invoices",
            EntityClass::Projects => "projects",
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityClass {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityClass::ALL
            .into_iter()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| CacheError::UnknownKeyClass(s.to_string()))
    }
}

/// What part of an entity class a key covers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyScope {
    /// The full list of the class
    List,
    /// A single record by ID
    Record(String),
    /// A filtered list, identified by the hash of its filter
    Query(String),
}

/// Cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    class: EntityClass,
    scope: KeyScope,
}

impl CacheKey {
    pub fn list(class: EntityClass) -> Self {
        Self {
            class,
            scope: KeyScope::List,
        }
    }

    pub fn record(class: EntityClass, id: impl Into<String>) -> Self {
        Self {
            class,
            scope: KeyScope::Record(id.into()),
        }
    }

    /// Key for a filtered list; equal filters map to the same key
    pub fn query<Q: Hash + ?Sized>(class: EntityClass, filter: &Q) -> Self {
        let mut hasher = DefaultHasher::new();
        filter.hash(&mut hasher);
        Self {
            class,
            scope: KeyScope::Query(format!("{:x}", hasher.finish())),
        }
    }

    pub fn class(&self) -> EntityClass {
        self.class
    }

    pub fn scope(&self) -> &KeyScope {
        &self.scope
    }

    pub fn is_record(&self) -> bool {
        matches!(self.scope, KeyScope::Record(_))
    }

    pub fn record_id(&self) -> Option<&str> {
        match &self.scope {
            KeyScope::Record(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            KeyScope::List => write!(f, "{}", self.class),
            KeyScope::Record(id) => write!(f, "{}:record:{}", self.class, id),
            KeyScope::Query(hash) => write!(f, "{}:query:{}", self.class, hash),
        }
    }
}
