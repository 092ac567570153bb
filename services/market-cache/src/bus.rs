//! Intra-process publish/subscribe bus
//!
//! Every component publishes typed envelopes onto one broadcast channel;
//! consumers dispatch on the event tag. Publication is best-effort: with no
//! live subscriber the event is dropped silently.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use types::events::{EventEnvelope, MarketEvent};

const DEFAULT_CAPACITY: usize = 1024;

/// Cloneable handle to the process-wide event bus.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event stamped with the current time.
    pub fn publish(&self, event: MarketEvent) {
        self.publish_at(event, Utc::now());
    }

    /// Publish with an explicit timestamp (deterministic tests).
    pub fn publish_at(&self, event: MarketEvent, timestamp: DateTime<Utc>) {
        let kind = event.kind();
        match self.tx.send(EventEnvelope::at(event, timestamp)) {
            Ok(receivers) => debug!(kind, receivers, "event published"),
            // No subscriber yet; nothing to deliver.
            Err(_) => debug!(kind, "event dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
