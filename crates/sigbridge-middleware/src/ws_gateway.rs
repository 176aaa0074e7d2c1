//! WebSocket gateway onto the in-process bus.
//!
//! [`WsGateway`] serves a lightweight WebSocket endpoint where external
//! clients (dashboards, request/response callers, test harnesses) attach
//! to the pub/sub bus with small JSON frames:
//!
//! | Frame | Direction | Meaning |
//! |---|---|---|
//! | `{"op":"subscribe","topic":T}` | inbound | start receiving messages on `T` |
//! | `{"op":"unsubscribe","topic":T}` | inbound | stop receiving messages on `T` |
//! | `{"op":"publish","topic":T,"payload":P}` | inbound | publish `P` on `T` |
//! | `{"op":"message","topic":T,"payload":P}` | outbound | a message arrived on a subscribed `T` |
//!
//! The gateway is agnostic about the payloads it routes; it only handles
//! framing and transport.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use sigbridge_types::{BridgeError, BusMessage};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, warn};

use crate::bus::MessageBus;

/// Default TCP port for the gateway.
pub const DEFAULT_PORT: u16 = 9001;

/// WebSocket server bridging external clients onto a [`MessageBus`].
#[derive(Clone)]
pub struct WsGateway {
    bus: Arc<MessageBus>,
    port: u16,
}

impl WsGateway {
    /// Create a gateway backed by `bus` on the [`DEFAULT_PORT`].
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            bus,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Return the configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Start the server. Accepts connections until a fatal bind error.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Channel`] if the TCP listener cannot be bound.
    pub async fn run(self) -> Result<(), BridgeError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Channel(format!("ws bind error on {addr}: {e}")))?;

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let bus = Arc::clone(&self.bus);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, peer, bus).await {
                            error!(peer = %peer, error = %e, "ws client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "ws accept error");
                }
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    bus: Arc<MessageBus>,
) -> Result<(), BridgeError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| BridgeError::Channel(format!("ws handshake from {peer}: {e}")))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut bus_rx = bus.subscribe_all();
    // Topics this client asked for. Filtering happens here, per client, so
    // one noisy subscriber cannot affect another.
    let mut subscriptions: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            // Forward bus messages the client subscribed to.
            result = bus_rx.recv() => {
                match result {
                    Ok(msg) if subscriptions.contains(&msg.topic) => {
                        let frame = serde_json::json!({
                            "op": "message",
                            "topic": msg.topic,
                            "payload": msg.payload,
                        })
                        .to_string();
                        if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(peer = %peer, lagged_by = n, "ws client lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            // Handle incoming client frames.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&bus, &mut subscriptions, text.as_str());
                    }
                    _ => {}
                }
            }
        }
    }

    debug!(peer = %peer, "ws client disconnected");
    Ok(())
}

/// Apply one inbound client frame to the bus and the client's subscription
/// set. Frames that are not JSON or carry an unknown `op` are ignored.
fn handle_frame(bus: &MessageBus, subscriptions: &mut HashSet<String>, text: &str) {
    let Ok(frame) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };

    let op = frame.get("op").and_then(|v| v.as_str()).unwrap_or("");
    let Some(topic) = frame.get("topic").and_then(|v| v.as_str()) else {
        return;
    };

    match op {
        "subscribe" => {
            subscriptions.insert(topic.to_string());
        }
        "unsubscribe" => {
            subscriptions.remove(topic);
        }
        "publish" => {
            let payload = frame
                .get("payload")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let _ = bus.publish_message(BusMessage::new(topic, payload));
        }
        _ => {}
    }
}
