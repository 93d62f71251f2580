//! Latency log persistence
//!
//! The [`PersistenceWriter`] wakes on a fixed period, drains the latency queue
//! completely and appends one `;`-delimited line per record:
//!
//! ```text
//! 2024-01-02T03:04:05.123456789Z;sse;5000000
//! ```
//!
//! A failed write loses the records already popped for that batch; the
//! [`FailurePolicy`] decides whether the run carries on.

pub mod config;
pub mod writer;

pub use config::{FailurePolicy, LogTarget, PersistenceConfig};
pub use writer::{format_line, PersistenceWriter};
