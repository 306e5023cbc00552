use super::core::StoreObject;
use crate::StoreError;
use async_trait::async_trait;
use serde_json::Value;

/// Equality filter over top-level record fields
///
/// Conditions are kept sorted so that two filters with the same conditions
/// hash to the same query key regardless of insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StoreFilter {
    pub conditions: Vec<(String, String)>, // (field_name, value)
}

impl StoreFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_condition(mut self, field: &str, value: &str) -> Self {
        self.conditions.retain(|(existing, _)| existing != field);
        self.conditions.push((field.to_string(), value.to_string()));
        self.conditions.sort();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate against a serialized record
    ///
    /// String fields compare verbatim; numbers and booleans compare by
    /// their JSON rendering. Missing fields never match.
    pub fn matches(&self, record: &Value) -> bool {
        self.conditions.iter().all(|(field, expected)| match record.get(field) {
            Some(Value::String(actual)) => actual == expected,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == *expected,
        })
    }
}

/// Trait for objects that support filtering
#[async_trait]
pub trait Filterable: StoreObject {
    /// List objects filtered by some criteria
    async fn list_by_filter(&self, filter: &StoreFilter) -> Result<Vec<Self::Model>, StoreError>;
}
