//! Signal system for entity change notifications
//!
//! This crate carries change events (entity class + operation) from local
//! writes and remote clients to every interested subscriber.

pub mod errors;
pub mod event;
pub mod manager;
pub mod prelude;

pub use config::SignalConfig;
pub use errors::SignalError;
pub use event::{ChangeEvent, Operation};
pub use manager::SignalManager;

// Receiver side of the feed, re-exported so subscribers need no direct tokio import
pub use tokio::sync::broadcast::{error::RecvError, Receiver};
