//! Latency recorder and its queue

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::message::monotonic_nanos;
use crate::stats::BenchStats;

use super::record::{ReturnAck, ReturnRecord};

/// Producer side of the latency queue
///
/// Cheap to clone; every request handler may hold one. Never blocks.
#[derive(Debug, Clone)]
pub struct LatencyRecorder {
    tx: mpsc::UnboundedSender<ReturnRecord>,
    stats: Arc<BenchStats>,
}

/// Consumer side of the latency queue
///
/// Exactly one exists per recorder; the persistence writer owns it.
#[derive(Debug)]
pub struct RecordQueue {
    rx: mpsc::UnboundedReceiver<ReturnRecord>,
}

impl LatencyRecorder {
    /// Create a recorder and the queue it feeds
    pub fn channel(stats: Arc<BenchStats>) -> (Self, RecordQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, stats }, RecordQueue { rx })
    }

    /// Record an acknowledgment received now
    pub fn submit(&self, ack: &ReturnAck) -> ReturnRecord {
        self.submit_at(ack, monotonic_nanos())
    }

    /// Record an acknowledgment received at `received_at` monotonic
    /// nanoseconds
    pub fn submit_at(&self, ack: &ReturnAck, received_at: i64) -> ReturnRecord {
        let record = ReturnRecord::from_ack(ack, received_at);

        if self.tx.send(record.clone()).is_ok() {
            self.stats.add_submitted();
        } else {
            tracing::warn!(protocol = %ack.protocol, "Latency queue closed, record discarded");
        }

        record
    }
}

impl RecordQueue {
    /// Pop the next record without waiting
    pub fn try_pop(&mut self) -> Option<ReturnRecord> {
        self.rx.try_recv().ok()
    }

    /// Number of records currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
