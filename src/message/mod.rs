//! Outbound messages
//!
//! Every delivery carries a [`Message`]: the wall-clock time it was built, a
//! reading of the process-wide monotonic clock, and the filler payload. Clients
//! echo `sendTime` back on `/return`, and the difference against the clock at
//! receipt is the measured round trip.
//!
//! The payload is generated once at startup and shared by reference count, so
//! building a message per client costs two clock reads and an `Arc` bump.

pub mod clock;
pub mod factory;
pub mod frame;

pub use clock::monotonic_nanos;
pub use factory::MessageFactory;
pub use frame::{Message, Payload, TransportKind};
