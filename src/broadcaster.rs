//! Per-client delivery
//!
//! The broadcaster hands one message to every handle in a snapshot. Each
//! delivery is a non-blocking channel operation, so a slow or dead client can
//! only lose its own message; serialization and network writes happen later
//! on the client's own connection task.

use std::sync::Arc;

use crate::message::{Message, TransportKind};
use crate::registry::{ClientHandle, ClientId, ClientRegistry, DeliveryError};
use crate::stats::BenchStats;

/// Outcome counts for one delivery round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Messages handed to clients
    pub delivered: u64,
    /// Clients skipped because they had closed or were already answered
    pub skipped: u64,
    /// Messages dropped because the client's buffer was full
    pub dropped: u64,
}

impl BroadcastReport {
    fn record(&mut self, outcome: &Result<(), DeliveryError>) {
        match outcome {
            Ok(()) => self.delivered += 1,
            Err(DeliveryError::Closed) | Err(DeliveryError::AlreadyResolved) => self.skipped += 1,
            Err(DeliveryError::Full) => self.dropped += 1,
        }
    }

    /// Combine two reports
    pub fn merge(mut self, other: BroadcastReport) -> Self {
        self.delivered += other.delivered;
        self.skipped += other.skipped;
        self.dropped += other.dropped;
        self
    }
}

/// Delivers messages to registry snapshots
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
    stats: Arc<BenchStats>,
}

impl Broadcaster {
    /// Create a broadcaster over a registry
    pub fn new(registry: Arc<ClientRegistry>, stats: Arc<BenchStats>) -> Self {
        Self { registry, stats }
    }

    /// Deliver one message to a single client
    ///
    /// A client found closed is unregistered. Errors are returned for the
    /// caller's bookkeeping only; they never need handling.
    pub fn deliver_one(
        &self,
        id: ClientId,
        handle: &ClientHandle,
        message: Message,
    ) -> Result<(), DeliveryError> {
        let kind = handle.kind();

        let outcome = if handle.is_live() {
            handle.deliver(message)
        } else {
            Err(DeliveryError::Closed)
        };

        match outcome {
            Ok(()) if kind == TransportKind::Lp => self.stats.add_poll_resolved(),
            Ok(()) => {}
            Err(DeliveryError::Closed) => {
                self.registry.unregister(kind, id);
                tracing::debug!(kind = %kind, client_id = %id, "Skipped closed client");
            }
            Err(DeliveryError::Full) => {
                tracing::debug!(kind = %kind, client_id = %id, "Client buffer full, message dropped");
            }
            Err(DeliveryError::AlreadyResolved) => {
                tracing::trace!(client_id = %id, "Long-poll already resolved");
            }
        }

        let mut report = BroadcastReport::default();
        report.record(&outcome);
        self.stats
            .add_deliveries(report.delivered, report.skipped, report.dropped);

        outcome
    }

    /// Deliver one message to every client in a snapshot
    pub fn deliver(&self, clients: &[(ClientId, ClientHandle)], message: &Message) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for (id, handle) in clients {
            let outcome = self.deliver_one(*id, handle, message.clone());
            report.record(&outcome);
        }

        report
    }

    /// Deliver a shared message to every stream and socket client and answer
    /// every pending long-poll
    ///
    /// Clients registering while this runs are not included.
    pub fn broadcast(&self, message: &Message) -> BroadcastReport {
        let streams = self.registry.snapshot(TransportKind::Sse);
        let sockets = self.registry.snapshot(TransportKind::Ws);
        let polls = self.registry.drain(TransportKind::Lp);

        let report = self
            .deliver(&streams, message)
            .merge(self.deliver(&sockets, message))
            .merge(self.deliver(&polls, message));

        tracing::trace!(
            sse = streams.len(),
            ws = sockets.len(),
            lp = polls.len(),
            delivered = report.delivered,
            skipped = report.skipped,
            dropped = report.dropped,
            "Broadcast complete"
        );

        report
    }
}
