//! Request Responder – answers point-in-time signal queries.
//!
//! Each request walks a short, explicit path:
//!
//! | Stage | On failure |
//! |---|---|
//! | parse the request JSON | dropped (logged by the pump) |
//! | extract `requestId` | dropped (logged by the pump) |
//! | fetch the current value from the source | error response, status 1 |
//! | publish the response | error returned to the pump |
//!
//! The fetch is always fresh: a response reflects the signal *now*, never a
//! previously observed notification. Exactly one response publish is
//! attempted per well-formed request, and every response echoes the
//! request's correlation id.
//!
//! Malformed requests are dropped rather than error-responded: without a
//! correlation id there is no way to route a response back to its caller.

use std::sync::Arc;

use sigbridge_datapoint::DataPointSource;
use sigbridge_middleware::PubSubTransport;
use sigbridge_types::{BindingTable, BridgeError, RequestEnvelope, ResponseEnvelope};
use tracing::{debug, warn};

/// Answers requests on bound request topics.
pub struct RequestResponder {
    transport: Arc<dyn PubSubTransport>,
    source: Arc<dyn DataPointSource>,
    bindings: Arc<BindingTable>,
}

impl RequestResponder {
    pub fn new(
        transport: Arc<dyn PubSubTransport>,
        source: Arc<dyn DataPointSource>,
        bindings: Arc<BindingTable>,
    ) -> Self {
        Self {
            transport,
            source,
            bindings,
        }
    }

    /// Handle one message that arrived on a bound request topic.
    ///
    /// # Errors
    ///
    /// * [`BridgeError::MalformedRequest`] – unparseable payload or missing
    ///   `requestId`; no fetch was attempted, no response published.
    /// * [`BridgeError::Publish`] – the response could not be handed to the
    ///   transport. A fetch failure is *not* an error here: it still
    ///   produces a (non-zero-status) response.
    pub async fn on_request(&self, topic: &str, raw_payload: &str) -> Result<(), BridgeError> {
        let binding = self.bindings.by_request_topic(topic).ok_or_else(|| {
            BridgeError::Channel(format!("no binding for request topic '{topic}'"))
        })?;

        let request = RequestEnvelope::parse(raw_payload)?;
        debug!(
            topic = %topic,
            request_id = %request.request_id,
            "request received"
        );

        let response = match self.source.get_current(&binding.datapoint_path).await {
            Ok(value) => ResponseEnvelope::success(&request.request_id, &binding.signal_id, value),
            Err(e) => {
                warn!(
                    signal = %binding.signal_id,
                    request_id = %request.request_id,
                    error = %e,
                    "fetch failed, answering with error response"
                );
                ResponseEnvelope::failure(
                    &request.request_id,
                    format!("failed to read {}: {e}", binding.signal_id),
                )
            }
        };

        self.transport
            .publish(&binding.response_topic, response.to_json()?)
            .await
    }
}
