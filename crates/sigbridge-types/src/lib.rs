use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A point-in-time value of a vehicle signal as exposed by the data-point
/// source. Signals are numeric or boolean; strings are not vehicle signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl SignalValue {
    /// A value the bridge is allowed to forward. Non-finite floats (NaN,
    /// ±inf) would serialize to `null` and are rejected at the door.
    pub fn is_well_formed(&self) -> bool {
        match self {
            SignalValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl std::fmt::Display for SignalValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalValue::Bool(v) => write!(f, "{v}"),
            SignalValue::Int(v) => write!(f, "{v}"),
            // {:?} keeps the trailing ".0" on whole floats ("42.0", not "42"),
            // matching the JSON rendering of the same value.
            SignalValue::Float(v) => write!(f, "{v:?}"),
        }
    }
}

/// A change notification delivered by the data-point source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalChange {
    /// Data-point path of the signal that changed, e.g. "Vehicle.Speed".
    pub signal: String,
    pub value: SignalValue,
}

/// One message on the pub/sub bus. The `payload` is UTF-8 JSON text; `id`
/// and `timestamp` exist for tracing and never leave the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Hierarchical topic string, e.g. "vehicle_app/getSpeed/".
    pub topic: String,
    pub payload: String,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / response envelopes
// ---------------------------------------------------------------------------

/// Status code for a successful fetch.
pub const STATUS_OK: u32 = 0;
/// Status code when the data-point source could not deliver a value.
pub const STATUS_FETCH_FAILED: u32 = 1;

/// Inbound request on a request topic. Only the correlation id is the
/// responder's concern; callers may send whatever extra fields they like.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "requestId")]
    pub request_id: String,
}

impl RequestEnvelope {
    /// Parse a raw request payload. Unparseable JSON or a missing
    /// `requestId` both count as a malformed request.
    pub fn parse(raw: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(raw).map_err(|e| BridgeError::MalformedRequest(e.to_string()))
    }
}

/// The `result` object inside a [`ResponseEnvelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseResult {
    pub status: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<SignalValue>,
}

/// Outbound response on a response topic. Always echoes the request's
/// correlation id so the caller can match it to its request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub result: ResponseResult,
}

impl ResponseEnvelope {
    /// Build a status-0 response carrying the fetched value.
    pub fn success(request_id: impl Into<String>, signal_id: &str, value: SignalValue) -> Self {
        Self {
            request_id: request_id.into(),
            result: ResponseResult {
                status: STATUS_OK,
                message: format!("{signal_id} = {value}"),
                value: Some(value),
            },
        }
    }

    /// Build a non-zero-status response describing a fetch failure.
    pub fn failure(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            result: ResponseResult {
                status: STATUS_FETCH_FAILED,
                message: message.into(),
                value: None,
            },
        }
    }

    pub fn to_json(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self).map_err(|e| BridgeError::Serialization(e.to_string()))
    }
}

/// Serialize the `{ "<signal-id>": value }` payload published on a
/// notification topic.
pub fn notification_payload(signal_id: &str, value: &SignalValue) -> Result<String, BridgeError> {
    let mut map = serde_json::Map::new();
    map.insert(
        signal_id.to_string(),
        serde_json::to_value(value).map_err(|e| BridgeError::Serialization(e.to_string()))?,
    );
    serde_json::to_string(&serde_json::Value::Object(map))
        .map_err(|e| BridgeError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Topic bindings
// ---------------------------------------------------------------------------

/// Static mapping from one logical signal to its three bus topics. Built
/// from configuration at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicBinding {
    /// Short logical name used in payloads, e.g. "Speed".
    pub signal_id: String,
    /// Full data-point path on the source, e.g. "Vehicle.Speed".
    pub datapoint_path: String,
    /// Topic for change notifications, e.g. "vehicle_app/currentSpeed/".
    pub notify_topic: String,
    /// Topic the responder listens on, e.g. "vehicle_app/getSpeed/".
    pub request_topic: String,
    /// Topic responses are published to, e.g. "vehicle_app/getSpeed/response".
    pub response_topic: String,
}

impl TopicBinding {
    /// Derive the conventional topic triple from an app name and signal id:
    /// `<app>/current<Id>/`, `<app>/get<Id>/`, `<app>/get<Id>/response`.
    pub fn with_default_topics(
        app: &str,
        signal_id: impl Into<String>,
        datapoint_path: impl Into<String>,
    ) -> Self {
        let signal_id = signal_id.into();
        Self {
            notify_topic: format!("{app}/current{signal_id}/"),
            request_topic: format!("{app}/get{signal_id}/"),
            response_topic: format!("{app}/get{signal_id}/response"),
            signal_id,
            datapoint_path: datapoint_path.into(),
        }
    }
}

/// The full binding set for one app. Each logical signal has exactly one
/// binding; the set never changes at runtime.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: Vec<TopicBinding>,
}

impl BindingTable {
    /// Build a table, rejecting duplicate signal ids or request topics.
    pub fn new(bindings: Vec<TopicBinding>) -> Result<Self, BridgeError> {
        for (i, b) in bindings.iter().enumerate() {
            for other in &bindings[..i] {
                if other.signal_id == b.signal_id {
                    return Err(BridgeError::Config(format!(
                        "duplicate binding for signal '{}'",
                        b.signal_id
                    )));
                }
                if other.request_topic == b.request_topic {
                    return Err(BridgeError::Config(format!(
                        "request topic '{}' bound twice",
                        b.request_topic
                    )));
                }
            }
        }
        Ok(Self { bindings })
    }

    pub fn by_signal(&self, signal_id: &str) -> Option<&TopicBinding> {
        self.bindings.iter().find(|b| b.signal_id == signal_id)
    }

    pub fn by_request_topic(&self, topic: &str) -> Option<&TopicBinding> {
        self.bindings.iter().find(|b| b.request_topic == topic)
    }

    pub fn by_datapoint_path(&self, path: &str) -> Option<&TopicBinding> {
        self.bindings.iter().find(|b| b.datapoint_path == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Global error type spanning request parsing, data-point fetches, and bus
/// publishes.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Unparseable request JSON or missing correlation id. Recovered
    /// locally; never crosses the bus.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The data-point source was unreachable or returned an error. Surfaced
    /// to the requester as a non-zero-status response.
    #[error("fetch of '{signal}' failed: {reason}")]
    SignalFetch { signal: String, reason: String },

    /// The transport rejected a publish. Not locally recoverable.
    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_value_untagged_roundtrip() {
        let json = serde_json::to_string(&SignalValue::Float(55.5)).unwrap();
        assert_eq!(json, "55.5");
        let back: SignalValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SignalValue::Float(55.5));

        let back: SignalValue = serde_json::from_str("true").unwrap();
        assert_eq!(back, SignalValue::Bool(true));

        let back: SignalValue = serde_json::from_str("17").unwrap();
        assert_eq!(back, SignalValue::Int(17));
    }

    #[test]
    fn signal_value_display_keeps_float_point() {
        assert_eq!(SignalValue::Float(42.0).to_string(), "42.0");
        assert_eq!(SignalValue::Int(42).to_string(), "42");
        assert_eq!(SignalValue::Bool(false).to_string(), "false");
    }

    #[test]
    fn non_finite_floats_are_malformed() {
        assert!(!SignalValue::Float(f64::NAN).is_well_formed());
        assert!(!SignalValue::Float(f64::INFINITY).is_well_formed());
        assert!(SignalValue::Float(0.0).is_well_formed());
        assert!(SignalValue::Bool(true).is_well_formed());
    }

    #[test]
    fn request_envelope_parses_and_ignores_extra_fields() {
        let env = RequestEnvelope::parse(r#"{"requestId":"abc123","extra":42}"#).unwrap();
        assert_eq!(env.request_id, "abc123");
    }

    #[test]
    fn request_envelope_rejects_missing_id() {
        let result = RequestEnvelope::parse(r#"{"somethingElse":1}"#);
        assert!(matches!(result, Err(BridgeError::MalformedRequest(_))));
    }

    #[test]
    fn request_envelope_rejects_non_json() {
        let result = RequestEnvelope::parse("not json");
        assert!(matches!(result, Err(BridgeError::MalformedRequest(_))));
    }

    #[test]
    fn success_response_shape() {
        let resp = ResponseEnvelope::success("abc123", "Speed", SignalValue::Float(42.0));
        let json = resp.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"requestId":"abc123","result":{"status":0,"message":"Speed = 42.0","value":42.0}}"#
        );
    }

    #[test]
    fn failure_response_has_nonzero_status_and_no_value() {
        let resp = ResponseEnvelope::failure("r1", "source unreachable");
        assert_eq!(resp.result.status, STATUS_FETCH_FAILED);
        assert!(resp.result.value.is_none());
        let json = resp.to_json().unwrap();
        assert!(!json.contains("\"value\""));
        assert!(json.contains("source unreachable"));
    }

    #[test]
    fn notification_payload_keys_by_signal_id() {
        let payload = notification_payload("Speed", &SignalValue::Float(55.5)).unwrap();
        assert_eq!(payload, r#"{"Speed":55.5}"#);
    }

    #[test]
    fn default_topics_follow_convention() {
        let b = TopicBinding::with_default_topics("vehicle_app", "Speed", "Vehicle.Speed");
        assert_eq!(b.notify_topic, "vehicle_app/currentSpeed/");
        assert_eq!(b.request_topic, "vehicle_app/getSpeed/");
        assert_eq!(b.response_topic, "vehicle_app/getSpeed/response");
        assert_eq!(b.datapoint_path, "Vehicle.Speed");
    }

    #[test]
    fn binding_table_lookups() {
        let table = BindingTable::new(vec![
            TopicBinding::with_default_topics("app", "Speed", "Vehicle.Speed"),
            TopicBinding::with_default_topics("app", "IsMoving", "Vehicle.IsMoving"),
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.by_request_topic("app/getSpeed/").unwrap().signal_id,
            "Speed"
        );
        assert_eq!(
            table.by_datapoint_path("Vehicle.IsMoving").unwrap().signal_id,
            "IsMoving"
        );
        assert!(table.by_signal("Rpm").is_none());
    }

    #[test]
    fn binding_table_rejects_duplicate_signal() {
        let result = BindingTable::new(vec![
            TopicBinding::with_default_topics("app", "Speed", "Vehicle.Speed"),
            TopicBinding::with_default_topics("app", "Speed", "Vehicle.AverageSpeed"),
        ]);
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn bus_message_carries_topic_and_payload() {
        let msg = BusMessage::new("app/getSpeed/", r#"{"requestId":"x"}"#);
        assert_eq!(msg.topic, "app/getSpeed/");
        assert_eq!(msg.payload, r#"{"requestId":"x"}"#);
    }

    #[test]
    fn bridge_error_display() {
        let err = BridgeError::SignalFetch {
            signal: "Speed".to_string(),
            reason: "broker down".to_string(),
        };
        assert!(err.to_string().contains("Speed"));
        assert!(err.to_string().contains("broker down"));
    }
}
