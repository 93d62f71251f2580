//! Statistics and metrics for a benchmark run

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Run-wide counters
///
/// Updated lock-free from the broadcaster, the latency recorder and the
/// persistence writer.
#[derive(Debug)]
pub struct BenchStats {
    started_at: Instant,
    delivered: AtomicU64,
    skipped: AtomicU64,
    dropped: AtomicU64,
    ticks: AtomicU64,
    polls_resolved: AtomicU64,
    records_submitted: AtomicU64,
    records_written: AtomicU64,
    records_lost: AtomicU64,
    write_failures: AtomicU64,
}

impl BenchStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            delivered: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            polls_resolved: AtomicU64::new(0),
            records_submitted: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            records_lost: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
        }
    }

    /// Record the outcome of one delivery round
    pub fn add_deliveries(&self, delivered: u64, skipped: u64, dropped: u64) {
        self.delivered.fetch_add(delivered, Ordering::Relaxed);
        self.skipped.fetch_add(skipped, Ordering::Relaxed);
        self.dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    /// Record one scheduler firing
    pub fn add_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one long-poll answered
    pub fn add_poll_resolved(&self) {
        self.polls_resolved.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one acknowledgment entering the queue
    pub fn add_submitted(&self) {
        self.records_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record lines written by one flush
    pub fn add_written(&self, records: u64) {
        self.records_written.fetch_add(records, Ordering::Relaxed);
    }

    /// Record a failed flush and the records it lost
    pub fn add_write_failure(&self, lost: u64) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
        self.records_lost.fetch_add(lost, Ordering::Relaxed);
    }

    /// Copy the current counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            delivered: self.delivered.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            polls_resolved: self.polls_resolved.load(Ordering::Relaxed),
            records_submitted: self.records_submitted.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_lost: self.records_lost.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for BenchStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`BenchStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Time since the counters were created
    pub uptime: Duration,
    /// Messages handed to clients
    pub delivered: u64,
    /// Deliveries skipped because the client had gone away
    pub skipped: u64,
    /// Messages dropped because a client's buffer was full
    pub dropped: u64,
    /// Scheduler firings (global ticks or per-client timer firings)
    pub ticks: u64,
    /// Long-poll requests answered with a message
    pub polls_resolved: u64,
    /// Acknowledgments accepted by the recorder
    pub records_submitted: u64,
    /// Records written to the latency log
    pub records_written: u64,
    /// Records popped but lost to a failed write
    pub records_lost: u64,
    /// Flush cycles that failed
    pub write_failures: u64,
}

impl StatsSnapshot {
    /// Records accepted but not yet written or lost
    pub fn records_pending(&self) -> u64 {
        self.records_submitted
            .saturating_sub(self.records_written + self.records_lost)
    }

    /// Average deliveries per second since start
    pub fn delivery_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.delivered as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = BenchStats::new().snapshot();
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.records_submitted, 0);
        assert_eq!(stats.records_written, 0);
        assert_eq!(stats.write_failures, 0);
    }

    #[test]
    fn test_deliveries_accumulate() {
        let stats = BenchStats::new();
        stats.add_deliveries(3, 1, 0);
        stats.add_deliveries(2, 0, 4);
        stats.add_tick();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.delivered, 5);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.dropped, 4);
        assert_eq!(snapshot.ticks, 1);
    }

    #[test]
    fn test_records_pending() {
        let stats = BenchStats::new();
        for _ in 0..10 {
            stats.add_submitted();
        }
        stats.add_written(6);
        stats.add_write_failure(3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_pending(), 1);
        assert_eq!(snapshot.write_failures, 1);
        assert_eq!(snapshot.records_lost, 3);
    }

    #[test]
    fn test_delivery_rate_zero_uptime() {
        let snapshot = StatsSnapshot::default();
        assert_eq!(snapshot.delivery_rate(), 0.0);
    }
}
