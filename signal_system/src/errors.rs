//! Error types for the signal system

use crate::event::Operation;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    #[error("No subscribers for {operation} event on '{entity_class}'")]
    NoSubscribers {
        entity_class: String,
        operation: Operation,
    },
}
