//! Round-trip latency ingestion
//!
//! Clients acknowledge each message by posting back its `sendTime`. The
//! [`LatencyRecorder`] turns each acknowledgment into a [`ReturnRecord`] and
//! pushes it onto an unbounded queue with many producers (request handlers)
//! and exactly one consumer ([`RecordQueue`], owned by the persistence
//! writer).

pub mod record;
pub mod recorder;

pub use record::{ReturnAck, ReturnRecord};
pub use recorder::{LatencyRecorder, RecordQueue};
