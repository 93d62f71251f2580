//! Message and transport types
//!
//! This module defines the unit pushed to clients and the tag identifying
//! which transport carried it.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Transport a client is connected through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Server-sent events stream
    Sse,
    /// WebSocket
    Ws,
    /// Long-poll request
    Lp,
}

impl TransportKind {
    /// All transport kinds, in registry order
    pub const ALL: [TransportKind; 3] = [TransportKind::Sse, TransportKind::Ws, TransportKind::Lp];

    /// Tag written to the latency log
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Sse => "sse",
            TransportKind::Ws => "ws",
            TransportKind::Lp => "lp",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filler content sent with every message
///
/// Always valid UTF-8. Cheap to clone due to `Bytes` reference counting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub struct Payload(Bytes);

impl Payload {
    /// Wrap a static string
    pub fn from_static(s: &'static str) -> Self {
        Self(Bytes::from_static(s.as_bytes()))
    }

    /// View the payload as text
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A timestamped unit pushed to a client
///
/// Immutable once built; not retained after delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Wall-clock instant the message was built
    pub timestamp: DateTime<Utc>,
    /// Monotonic clock reading in nanoseconds, echoed back by the client
    pub send_time: i64,
    /// Filler content
    pub payload: Payload,
}

impl Message {
    /// Serialize to the JSON text sent over SSE, WebSocket and long-poll
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_tags() {
        assert_eq!(TransportKind::Sse.to_string(), "sse");
        assert_eq!(TransportKind::Ws.to_string(), "ws");
        assert_eq!(TransportKind::Lp.to_string(), "lp");

        let kind: TransportKind = serde_json::from_str("\"ws\"").unwrap();
        assert_eq!(kind, TransportKind::Ws);
    }

    #[test]
    fn test_message_json_shape() {
        let message = Message {
            timestamp: DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
            send_time: 42,
            payload: Payload::from_static("X"),
        };

        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value["sendTime"], 42);
        assert_eq!(value["payload"], "X");
        assert_eq!(value["timestamp"], "2024-01-02T03:04:05Z");
    }

    #[test]
    fn test_payload_clone_shares_storage() {
        let payload = Payload::from(String::from("abc"));
        let clone = payload.clone();
        assert_eq!(payload.as_str().as_ptr(), clone.as_str().as_ptr());
        assert_eq!(clone.len(), 3);
    }
}
