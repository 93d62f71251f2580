//! Message factory

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::clock::monotonic_nanos;
use super::frame::{Message, Payload};

/// Builds fresh [`Message`]s around a fixed payload
#[derive(Debug, Clone)]
pub struct MessageFactory {
    payload: Payload,
}

impl MessageFactory {
    /// Create a factory with the given payload
    pub fn new(payload: Payload) -> Self {
        Self { payload }
    }

    /// Create a factory with `len` bytes of random alphanumeric filler
    pub fn with_random_payload(len: usize) -> Self {
        let filler: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        Self::new(Payload::from(filler))
    }

    /// The payload every message carries
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Build a message stamped with the current wall and monotonic time
    pub fn create(&self) -> Message {
        Message {
            timestamp: Utc::now(),
            send_time: monotonic_nanos(),
            payload: self.payload.clone(),
        }
    }
}

impl Default for MessageFactory {
    fn default() -> Self {
        Self::new(Payload::default())
    }
}
