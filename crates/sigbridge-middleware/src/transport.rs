//! The narrow seam to the pub/sub bus.
//!
//! The bridge components never speak a wire protocol directly. They publish
//! and subscribe through [`PubSubTransport`]. Whatever sits behind it (the
//! in-process [`MessageBus`][crate::bus::MessageBus] in tests and local
//! runs, a broker connection in a deployment) owns the wire details,
//! including any retry or backoff.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use sigbridge_types::{BridgeError, BusMessage};

/// Publish/subscribe access to the MQTT-like bus.
///
/// # Contract
///
/// * `publish` – deliver one UTF-8 JSON payload to a topic. A returned
///   error means the transport could not accept the message; callers must
///   not retry locally.
///
/// * `subscribe` – a live stream of every message arriving on the given
///   topic. The stream ends when the transport shuts down.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BridgeError>;

    /// Subscribe to `topic`, receiving each inbound message in order of
    /// arrival.
    async fn subscribe(&self, topic: &str) -> Result<BoxStream<'static, BusMessage>, BridgeError>;
}
