use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Unique message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A JSON message on a broker topic.
///
/// This is the unit carried by the bus in both directions: ingress
/// (`plant/sensor`, `plant/status`) and egress (`plant/ml/prediction`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerMessage {
    id: MessageId,
    topic: String,
    payload: JsonValue,
    /// When the message entered this process.
    received_at: DateTime<Utc>,
}

impl BrokerMessage {
    pub fn new(topic: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            id: MessageId::new(),
            topic: topic.into(),
            payload,
            received_at: Utc::now(),
        }
    }

    /// Decode raw broker bytes. Non-JSON payloads are an error.
    pub fn from_bytes(topic: impl Into<String>, bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let payload = serde_json::from_slice(bytes)?;
        Ok(Self::new(topic, payload))
    }

    /// Serialize `value` as the payload.
    pub fn json<T: Serialize>(
        topic: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(topic, serde_json::to_value(value)?))
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn into_payload(self) -> JsonValue {
        self.payload
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Payload bytes for a transport.
    pub fn payload_bytes(&self) -> Vec<u8> {
        self.payload.to_string().into_bytes()
    }
}
