//! Convenience re-exports for common signal-system usage

pub use crate::errors::SignalError;
pub use crate::event::{ChangeEvent, Operation};
pub use crate::manager::SignalManager;

pub use config::SignalConfig;

// Common external dependencies
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;
