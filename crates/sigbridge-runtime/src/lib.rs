//! `sigbridge-runtime` – the event-driven core.
//!
//! Two components do all the work, both driven entirely by external events:
//!
//! - [`SignalBridge`] republishes live signal changes from the data-point
//!   source onto notification topics.
//! - [`RequestResponder`] answers point-in-time "get current value"
//!   requests with correlated JSON responses.
//!
//! The [`Supervisor`] binds both to their topics at startup and pumps
//! events into them until shutdown. [`telemetry`] wires up tracing with an
//! optional OpenTelemetry exporter.

pub mod bridge;
pub mod responder;
pub mod supervisor;
pub mod telemetry;

pub use bridge::SignalBridge;
pub use responder::RequestResponder;
pub use supervisor::{Supervisor, shutdown_channel};
