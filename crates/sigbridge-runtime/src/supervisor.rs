//! Startup wiring and event pumps.
//!
//! The [`Supervisor`] makes every subscription explicit: at startup it
//! walks the binding table, subscribes each request topic on the transport
//! and each signal on the data-point source, and spawns one pump task per
//! subscription. Nothing is registered by side effect; what runs is exactly
//! what the table says.
//!
//! Shutdown is cooperative. Flipping the [`watch`] flag stops every pump
//! from taking new events; a handler already past its receive point
//! finishes its publish before the pump exits.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sigbridge_datapoint::DataPointSource;
use sigbridge_middleware::PubSubTransport;
use sigbridge_types::{BindingTable, BridgeError, BusMessage, SignalChange};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bridge::SignalBridge;
use crate::responder::RequestResponder;

/// Create the shutdown flag shared by every pump. Send `true` once to
/// begin a graceful stop.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Owns the two components and their pump tasks for one app.
pub struct Supervisor {
    transport: Arc<dyn PubSubTransport>,
    source: Arc<dyn DataPointSource>,
    bindings: Arc<BindingTable>,
    shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    pub fn new(
        transport: Arc<dyn PubSubTransport>,
        source: Arc<dyn DataPointSource>,
        bindings: Arc<BindingTable>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport,
            source,
            bindings,
            shutdown,
        }
    }

    /// Subscribe everything, spawn the pumps, and run until shutdown.
    ///
    /// Returns once every pump has drained. Fails fast if any initial
    /// subscription is refused; after that point individual event failures
    /// are logged by the pumps, never fatal.
    pub async fn run(self) -> Result<(), BridgeError> {
        let bridge = Arc::new(SignalBridge::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.bindings),
        ));
        let responder = Arc::new(RequestResponder::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.source),
            Arc::clone(&self.bindings),
        ));

        let mut pumps: Vec<JoinHandle<()>> = Vec::new();
        for binding in self.bindings.iter() {
            let changes = self.source.subscribe_changes(&binding.datapoint_path).await?;
            pumps.push(spawn_change_pump(
                Arc::clone(&bridge),
                binding.signal_id.clone(),
                changes,
                self.shutdown.clone(),
            ));

            let requests = self.transport.subscribe(&binding.request_topic).await?;
            pumps.push(spawn_request_pump(
                Arc::clone(&responder),
                binding.request_topic.clone(),
                requests,
                self.shutdown.clone(),
            ));
        }

        info!(bindings = self.bindings.len(), "signal bridge running");

        for pump in pumps {
            let _ = pump.await;
        }
        info!("signal bridge stopped");
        Ok(())
    }
}

fn spawn_change_pump(
    bridge: Arc<SignalBridge>,
    signal_id: String,
    mut changes: BoxStream<'static, SignalChange>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                next = changes.next() => match next {
                    Some(change) => {
                        if let Err(e) = bridge.on_signal_changed(&signal_id, &change.value).await {
                            error!(signal = %signal_id, error = %e, "notification publish failed");
                        }
                    }
                    None => break,
                },
            }
        }
        debug!(signal = %signal_id, "change pump stopped");
    })
}

fn spawn_request_pump(
    responder: Arc<RequestResponder>,
    topic: String,
    mut requests: BoxStream<'static, BusMessage>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                next = requests.next() => match next {
                    Some(msg) => {
                        if let Err(e) = responder.on_request(&msg.topic, &msg.payload).await {
                            match e {
                                BridgeError::MalformedRequest(reason) => {
                                    warn!(topic = %topic, %reason, "malformed request dropped");
                                }
                                other => {
                                    error!(topic = %topic, error = %other, "request handling failed");
                                }
                            }
                        }
                    }
                    None => break,
                },
            }
        }
        debug!(topic = %topic, "request pump stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigbridge_datapoint::SimDataPointSource;
    use sigbridge_middleware::MessageBus;
    use sigbridge_types::{ResponseEnvelope, SignalValue, TopicBinding};
    use std::time::Duration;

    async fn start_stack() -> (
        Arc<MessageBus>,
        Arc<SimDataPointSource>,
        watch::Sender<bool>,
        JoinHandle<Result<(), BridgeError>>,
    ) {
        let bus = Arc::new(MessageBus::default());
        let source = Arc::new(
            SimDataPointSource::new().with_signal("Vehicle.Speed", SignalValue::Float(42.0)),
        );
        let bindings = Arc::new(
            BindingTable::new(vec![TopicBinding::with_default_topics(
                "app",
                "Speed",
                "Vehicle.Speed",
            )])
            .unwrap(),
        );

        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        let supervisor = Supervisor::new(bus.clone(), source.clone(), bindings, shutdown_rx);
        let handle = tokio::spawn(supervisor.run());

        // Let the supervisor finish its subscriptions before the test
        // starts publishing.
        tokio::time::sleep(Duration::from_millis(50)).await;

        (bus, source, shutdown_tx, handle)
    }

    #[tokio::test]
    async fn request_over_the_bus_is_answered() {
        let (bus, _source, shutdown_tx, handle) = start_stack().await;
        let mut responses = bus.subscribe_topic("app/getSpeed/response");

        bus.publish_message(BusMessage::new(
            "app/getSpeed/",
            r#"{"requestId":"abc123"}"#,
        ))
        .unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(1), responses.next())
            .await
            .expect("response within 1s")
            .expect("stream alive");
        let response: ResponseEnvelope = serde_json::from_str(&msg.payload).unwrap();
        assert_eq!(response.request_id, "abc123");
        assert_eq!(response.result.status, 0);
        assert_eq!(response.result.message, "Speed = 42.0");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("supervisor stops on shutdown")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn signal_mutation_is_republished() {
        let (bus, source, shutdown_tx, handle) = start_stack().await;
        let mut notifications = bus.subscribe_topic("app/currentSpeed/");

        source
            .set_value("Vehicle.Speed", SignalValue::Float(55.5))
            .unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(1), notifications.next())
            .await
            .expect("notification within 1s")
            .expect("stream alive");
        assert_eq!(msg.payload, r#"{"Speed":55.5}"#);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("supervisor stops on shutdown")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn malformed_request_does_not_kill_the_pump() {
        let (bus, _source, shutdown_tx, handle) = start_stack().await;
        let mut responses = bus.subscribe_topic("app/getSpeed/response");

        bus.publish_message(BusMessage::new("app/getSpeed/", "not json"))
            .unwrap();
        bus.publish_message(BusMessage::new(
            "app/getSpeed/",
            r#"{"requestId":"after-garbage"}"#,
        ))
        .unwrap();

        // The pump survives the garbage and answers the next request.
        let msg = tokio::time::timeout(Duration::from_secs(1), responses.next())
            .await
            .expect("response within 1s")
            .expect("stream alive");
        let response: ResponseEnvelope = serde_json::from_str(&msg.payload).unwrap();
        assert_eq!(response.request_id, "after-garbage");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("supervisor stops on shutdown")
            .unwrap()
            .unwrap();
    }
}
