//! Cache parameter configuration
//!
//! Per-key-class TTLs and the "derived from" relation between entity
//! classes, validated once from [`CacheConfig`].

use crate::errors::CacheError;
use crate::key::EntityClass;
use config::CacheConfig;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;

/// Cache parameters shared by every store and trigger of a session
#[derive(Debug, Clone)]
pub struct CacheParams {
    default_ttl: Duration,
    ttls: HashMap<EntityClass, Duration>,
    /// class -> classes whose keys are derived from it
    dependents: HashMap<EntityClass, BTreeSet<EntityClass>>,
}

impl CacheParams {
    /// Parameters with one TTL for every class and no cross-class derivations
    pub fn new(default_ttl: Duration) -> Result<Self, CacheError> {
        ensure_positive("default", default_ttl)?;
        Ok(Self {
            default_ttl,
            ttls: HashMap::new(),
            dependents: HashMap::new(),
        })
    }

    /// Validate configuration; unknown class names and zero TTLs are rejected
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let mut params = Self::new(Duration::from_millis(config.default_ttl_ms))?;

        for (name, settings) in &config.key_classes {
            let class = parse_class(name)?;
            params = params.with_ttl(class, Duration::from_millis(settings.ttl_ms))?;
            for source in &settings.depends_on {
                params = params.with_dependency(class, parse_class(source)?);
            }
        }

        Ok(params)
    }

    pub fn with_ttl(mut self, class: EntityClass, ttl: Duration) -> Result<Self, CacheError> {
        ensure_positive(class.as_str(), ttl)?;
        self.ttls.insert(class, ttl);
        Ok(self)
    }

    /// Record that keys of `class` are derived from `source`
    pub fn with_dependency(mut self, class: EntityClass, source: EntityClass) -> Self {
        if class != source {
            self.dependents.entry(source).or_default().insert(class);
        }
        self
    }

    pub fn ttl(&self, class: EntityClass) -> Duration {
        self.ttls.get(&class).copied().unwrap_or(self.default_ttl)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Classes (other than `changed` itself) whose keys a change to
    /// `changed` invalidates, following derivations transitively
    pub fn dependents_of(&self, changed: EntityClass) -> BTreeSet<EntityClass> {
        let mut affected = BTreeSet::new();
        let mut queue = VecDeque::from([changed]);

        while let Some(class) = queue.pop_front() {
            for dependent in self.dependents.get(&class).into_iter().flatten() {
                if *dependent != changed && affected.insert(*dependent) {
                    queue.push_back(*dependent);
                }
            }
        }

        affected
    }
}

fn parse_class(name: &str) -> Result<EntityClass, CacheError> {
    name.parse()
        .map_err(|_| CacheError::Configuration(format!("unknown key class '{}'", name)))
}

fn ensure_positive(class: &str, ttl: Duration) -> Result<(), CacheError> {
    if ttl.is_zero() {
        return Err(CacheError::Configuration(format!(
            "TTL for key class '{}' must be greater than zero",
            class
        )));
    }
    Ok(())
}
