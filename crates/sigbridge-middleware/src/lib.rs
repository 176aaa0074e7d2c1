//! `sigbridge-middleware` – pub/sub plumbing.
//!
//! Routes JSON payloads between the bridge components and the outside world
//! without caring what the payloads mean.
//!
//! # Modules
//!
//! - [`transport`] – the [`PubSubTransport`] seam both components talk to.
//! - [`bus`] – in-process [`MessageBus`] built on Tokio broadcast channels,
//!   standing in for the external MQTT-like broker.
//! - [`ws_gateway`] – WebSocket gateway exposing the bus to external clients
//!   as lightweight JSON frames.

pub mod bus;
pub mod transport;
pub mod ws_gateway;

pub use bus::MessageBus;
pub use transport::PubSubTransport;
pub use ws_gateway::WsGateway;
