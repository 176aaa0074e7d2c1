//! Signal Bridge – forwards live signal mutations to the bus.
//!
//! Every change notification from the data-point source yields exactly one
//! publish of `{ "<signal-id>": value }` on the signal's notification
//! topic. No deduplication, no rate limiting, no caching: the broker's
//! subscribers see the vehicle as the source reports it.

use std::sync::Arc;

use sigbridge_middleware::PubSubTransport;
use sigbridge_types::{BindingTable, BridgeError, SignalValue, notification_payload};
use tracing::{debug, warn};

/// Forwards signal changes onto notification topics.
pub struct SignalBridge {
    transport: Arc<dyn PubSubTransport>,
    bindings: Arc<BindingTable>,
}

impl SignalBridge {
    pub fn new(transport: Arc<dyn PubSubTransport>, bindings: Arc<BindingTable>) -> Self {
        Self {
            transport,
            bindings,
        }
    }

    /// Handle one change notification for the signal named `signal_id`.
    ///
    /// A malformed value (non-finite float) is dropped without publishing:
    /// better no notification than a `null` one. A change for a signal
    /// without a binding is likewise dropped. Both are logged. A transport
    /// rejection is returned to the caller; retrying is the transport's
    /// call, not ours.
    pub async fn on_signal_changed(
        &self,
        signal_id: &str,
        value: &SignalValue,
    ) -> Result<(), BridgeError> {
        let Some(binding) = self.bindings.by_signal(signal_id) else {
            warn!(signal = %signal_id, "change for unbound signal dropped");
            return Ok(());
        };

        if !value.is_well_formed() {
            warn!(signal = %signal_id, ?value, "malformed value, publish skipped");
            return Ok(());
        }

        let payload = notification_payload(signal_id, value)?;
        self.transport
            .publish(&binding.notify_topic, payload)
            .await?;
        debug!(signal = %signal_id, topic = %binding.notify_topic, "notification published");
        Ok(())
    }
}
