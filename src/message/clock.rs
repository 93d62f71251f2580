//! Process-wide monotonic clock
//!
//! All `sendTime` values and receipt instants are nanoseconds since a single
//! origin captured the first time the clock is read, so they are comparable
//! across every task and thread of the process.

use std::sync::OnceLock;
use std::time::Instant;

static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds elapsed since the process-wide origin
///
/// Never decreases. Saturates at `i64::MAX` (roughly 292 years of uptime).
pub fn monotonic_nanos() -> i64 {
    let origin = ORIGIN.get_or_init(Instant::now);
    i64::try_from(origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
}
