use crate::errors::SignalError;
use crate::event::ChangeEvent;
use config::SignalConfig;
use tokio::sync::broadcast;

/// Change feed for entity notifications
///
/// Every subscriber owns its own receiving end and drains it at its own
/// pace; no callback runs inside `emit`.
pub struct SignalManager {
    sender: broadcast::Sender<ChangeEvent>,
    config: SignalConfig,
}

impl std::fmt::Debug for SignalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalManager")
            .field("subscriber_count", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}

impl SignalManager {
    pub fn new(config: SignalConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self { sender, config }
    }

    /// Subscribe to every future event
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Emit event to all subscribers, returning how many received it
    pub fn emit(&self, event: ChangeEvent) -> Result<usize, SignalError> {
        let entity_class = event.entity_class.clone();
        let operation = event.operation;

        match self.sender.send(event) {
            Ok(subscriber_count) => {
                tracing::debug!(
                    "Broadcasted {} event for '{}' to {} subscriber(s)",
                    operation,
                    entity_class,
                    subscriber_count
                );
                Ok(subscriber_count)
            }
            Err(_) => {
                tracing::warn!(
                    "No subscribers for {} event on '{}'",
                    operation,
                    entity_class
                );
                Err(SignalError::NoSubscribers {
                    entity_class,
                    operation,
                })
            }
        }
    }

    /// Get number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }
}

impl Default for SignalManager {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}
