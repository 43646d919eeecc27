//! Broadcast channel for domain events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Instance
//! channels and external collaborators publish [`DomainEvent`]s through the
//! bus, and every observer subscription receives its own copy.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::DomainEvent;

/// Broadcast bus for [`DomainEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). Publishing never waits for subscribers: each
/// subscriber reads from its own cursor into a shared ring buffer, and a
/// subscriber that falls more than `capacity` events behind loses the
/// oldest ones. There is no persistence and no replay.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
    channel_name: Arc<str>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel name and capacity.
    #[must_use]
    pub fn new(channel_name: &str, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            channel_name: Arc::from(channel_name),
        }
    }

    /// Returns the logical channel name events are published on.
    #[must_use]
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: DomainEvent) -> usize {
        let kind = event.kind();
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::trace!(
            channel = %self.channel_name,
            kind = kind.as_str(),
            delivered,
            "event published"
        );
        delivered
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
