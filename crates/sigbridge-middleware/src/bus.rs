//! In-process, topic-addressed publish/subscribe bus.
//!
//! Uses [`tokio::sync::broadcast`] under the hood so every subscriber
//! receives every message without any single subscriber blocking the
//! others. Topic filtering happens on the subscriber side; publishing to a
//! topic nobody listens on is a normal condition, not an error, matching
//! broker semantics.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use sigbridge_types::{BridgeError, BusMessage};
use tokio::sync::broadcast;
use tracing::warn;

use crate::transport::PubSubTransport;

/// Default channel capacity (number of buffered messages before old ones
/// are dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared in-process bus. Clone it cheaply – all clones share the same
/// underlying broadcast channel.
#[derive(Clone, Debug)]
pub struct MessageBus {
    sender: broadcast::Sender<BusMessage>,
}

impl MessageBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a message to every current subscriber.
    ///
    /// Returns the number of receivers that were handed the message.
    /// `Ok(0)` when nobody is listening.
    pub fn publish_message(&self, message: BusMessage) -> Result<usize, BridgeError> {
        match self.sender.send(message) {
            Ok(n) => Ok(n),
            // broadcast reports "no receivers" as an error; for a bus
            // that's just an empty audience, not a failure.
            Err(broadcast::error::SendError(_)) => Ok(0),
        }
    }

    /// Subscribe to the raw firehose of every message on the bus.
    ///
    /// Used by the WebSocket gateway, which does its own per-client topic
    /// filtering. Most callers want [`subscribe_topic`][Self::subscribe_topic].
    pub fn subscribe_all(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }

    /// Subscribe to a single topic.
    ///
    /// The returned stream yields only messages whose topic matches
    /// exactly. A subscriber that falls behind skips the dropped messages
    /// (logged) and keeps going; the stream ends when the bus shuts down.
    pub fn subscribe_topic(&self, topic: impl Into<String>) -> BoxStream<'static, BusMessage> {
        let topic = topic.into();
        let rx = self.sender.subscribe();
        Box::pin(stream::unfold(rx, move |mut rx| {
            let topic = topic.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(msg) if msg.topic == topic => return Some((msg, rx)),
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(topic = %topic, lagged_by = n, "bus subscriber lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        }))
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl PubSubTransport for MessageBus {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BridgeError> {
        self.publish_message(BusMessage::new(topic, payload))
            .map(|_| ())
    }

    async fn subscribe(&self, topic: &str) -> Result<BoxStream<'static, BusMessage>, BridgeError> {
        Ok(self.subscribe_topic(topic))
    }
}
