//! Publish-subscribe transport seam
//!
//! The remote sink only needs "publish these bytes on this topic". Broker
//! clients (MQTT, NATS, ...) implement [`Transport`] outside this crate;
//! [`LocalBus`] is an in-process implementation used by the demo binary and
//! the tests.

use std::collections::HashMap;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use crate::errors::TransportError;

/// Publishes opaque payloads to a named topic
///
/// Implementations must be safe to call from the sink's worker thread and
/// provide their own synchronization.
pub trait Transport: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;
}

/// Message delivered to a [`LocalBus`] subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Receiving end of a topic subscription
pub struct Subscription {
    pub topic: String,
    pub receiver: Receiver<BusMessage>,
}

/// In-process topic bus built on crossbeam channels
///
/// Each subscriber gets a bounded queue; a full or disconnected subscriber
/// loses the message without affecting the publisher or other subscribers.
pub struct LocalBus {
    subscribers: RwLock<HashMap<String, Vec<Sender<BusMessage>>>>,
    capacity: usize,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, topic: &str) -> Subscription {
        let (sender, receiver) = channel::bounded(self.capacity);
        self.subscribers
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(sender);

        Subscription {
            topic: topic.to_string(),
            receiver,
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.read().get(topic).map_or(0, Vec::len)
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LocalBus {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut subscribers = self.subscribers.write();
        if let Some(senders) = subscribers.get_mut(topic) {
            let msg = BusMessage {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            };
            senders.retain(|sender| match sender.try_send(msg.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
        }
        Ok(())
    }
}
