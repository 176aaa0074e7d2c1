//! The narrow seam to the vehicle data broker.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use sigbridge_types::{BridgeError, SignalChange, SignalValue};

/// Read access to vehicle signals.
///
/// # Contract
///
/// * `get_current` – a fresh point-in-time read of one signal, a round trip
///   to the broker. Never served from a cached notification; stale answers
///   are worse than slow ones here. Any broker-side timeout surfaces as a
///   [`BridgeError::SignalFetch`].
///
/// * `subscribe_changes` – a live stream of change notifications for one
///   signal. The stream ends when the source shuts down.
///
/// Reading a signal never mutates it; the broker is the sole writer.
#[async_trait]
pub trait DataPointSource: Send + Sync {
    /// Fetch the current value of the signal at `signal_path`
    /// (e.g. "Vehicle.Speed").
    async fn get_current(&self, signal_path: &str) -> Result<SignalValue, BridgeError>;

    /// Subscribe to value changes of the signal at `signal_path`.
    async fn subscribe_changes(
        &self,
        signal_path: &str,
    ) -> Result<BoxStream<'static, SignalChange>, BridgeError>;
}
