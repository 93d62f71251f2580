//! Acknowledgment and record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::TransportKind;

/// Acknowledgment body posted by a client to `/return`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnAck {
    /// Wall-clock timestamp of the acknowledged message
    pub timestamp: DateTime<Utc>,
    /// Transport the message arrived through
    pub protocol: TransportKind,
    /// `sendTime` of the acknowledged message
    #[serde(rename = "sendTime", alias = "nanoTime")]
    pub send_time: i64,
}

/// One measured round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnRecord {
    /// Wall-clock timestamp of the original send
    pub timestamp: DateTime<Utc>,
    /// Transport the message travelled through
    pub protocol: TransportKind,
    /// Receipt time minus send time, in monotonic nanoseconds
    ///
    /// Negative only if the client reported a `sendTime` from the future.
    pub elapsed_nanos: i64,
}

impl ReturnRecord {
    /// Build a record from an acknowledgment observed at `received_at`
    pub fn from_ack(ack: &ReturnAck, received_at: i64) -> Self {
        Self {
            timestamp: ack.timestamp,
            protocol: ack.protocol,
            elapsed_nanos: received_at.saturating_sub(ack.send_time),
        }
    }
}
