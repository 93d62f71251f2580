//! Delivery error types
//!
//! Outcomes of a single delivery attempt to a single client handle.

/// Error type for per-client delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The client's connection has terminated
    Closed,
    /// The client's outbound buffer is full; the message was dropped
    Full,
    /// The long-poll request was already answered
    AlreadyResolved,
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Closed => write!(f, "Client connection closed"),
            DeliveryError::Full => write!(f, "Client buffer full"),
            DeliveryError::AlreadyResolved => write!(f, "Long-poll request already resolved"),
        }
    }
}

impl std::error::Error for DeliveryError {}
