//! Change event types and definitions
//!
//! This module defines the structure of change notifications that flow
//! through the signal system, whether they originate from a local write or
//! from another client of the backing store.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of change applied to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Unique event ID, used by subscribers to drop redelivered events
    #[serde(default = "Uuid::new_v4")]
    pub event_id: Uuid,
    /// Entity class (table name) the change applies to
    pub entity_class: String,
    pub operation: Operation,
    /// Record ID (if the change targets a single record)
    #[serde(default)]
    pub record_id: Option<String>,
    /// Opaque payload forwarded as-is
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Event timestamp (UTC)
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ChangeEvent {
    pub fn new(entity_class: impl Into<String>, operation: Operation) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            entity_class: entity_class.into(),
            operation,
            record_id: None,
            payload: serde_json::Value::Null,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = event_id;
        self
    }
}
