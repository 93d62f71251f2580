//! Delivery scheduler implementation

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::broadcaster::{BroadcastReport, Broadcaster};
use crate::error::Result;
use crate::message::{MessageFactory, TransportKind};
use crate::registry::{ClientId, ClientRegistry, DeliveryError};
use crate::stats::BenchStats;

use super::config::{SchedulerConfig, SchedulingMode};
use super::jitter::Jitter;

/// Decides when each client receives its next message
pub struct DeliveryScheduler {
    config: SchedulerConfig,
    jitter: Jitter,
    registry: Arc<ClientRegistry>,
    broadcaster: Arc<Broadcaster>,
    factory: Arc<MessageFactory>,
    stats: Arc<BenchStats>,
}

impl DeliveryScheduler {
    /// Create a scheduler
    ///
    /// Fails if the interval or jitter parameters are invalid.
    pub fn new(
        config: SchedulerConfig,
        registry: Arc<ClientRegistry>,
        broadcaster: Arc<Broadcaster>,
        factory: Arc<MessageFactory>,
        stats: Arc<BenchStats>,
    ) -> Result<Self> {
        let jitter = Jitter::from_config(&config)?;

        Ok(Self {
            config,
            jitter,
            registry,
            broadcaster,
            factory,
            stats,
        })
    }

    /// Get the scheduler configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Active scheduling mode
    pub fn mode(&self) -> SchedulingMode {
        self.config.mode
    }

    /// Fire one global tick
    ///
    /// Builds a single message and delivers it to every registered client,
    /// answering all pending long-polls.
    pub fn tick(&self) -> BroadcastReport {
        self.stats.add_tick();
        let message = self.factory.create();
        self.broadcaster.broadcast(&message)
    }

    /// Spawn the global tick loop
    ///
    /// The first tick fires immediately. Returns a handle that can be used to
    /// abort the task.
    pub fn spawn_global_tick(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let interval = scheduler.config.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                scheduler.tick();
            }
        })
    }

    /// Start per-client timing for a newly registered stream or socket client
    ///
    /// No-op under [`SchedulingMode::GlobalTick`]. The timer is attached to the
    /// registry entry and aborted when the client unregisters.
    pub fn attach_client(self: &Arc<Self>, kind: TransportKind, id: ClientId) {
        if self.config.mode != SchedulingMode::PerClientJitter || kind == TransportKind::Lp {
            return;
        }

        let scheduler = Arc::clone(self);
        let task = tokio::spawn(async move { scheduler.run_client_timer(kind, id).await });

        self.registry.attach_timer(kind, id, task.abort_handle());
    }

    /// Schedule the single answer to a long-poll request
    ///
    /// Under [`SchedulingMode::GlobalTick`] the next tick answers it instead.
    pub fn schedule_poll(self: &Arc<Self>, id: ClientId) {
        if self.config.mode != SchedulingMode::PerClientJitter {
            return;
        }

        let scheduler = Arc::clone(self);
        let delay = self.next_gap();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            if let Some(handle) = scheduler.registry.take(TransportKind::Lp, id) {
                scheduler.stats.add_tick();
                let _ = scheduler
                    .broadcaster
                    .deliver_one(id, &handle, scheduler.factory.create());
            }
        });

        self.registry
            .attach_timer(TransportKind::Lp, id, task.abort_handle());
    }

    async fn run_client_timer(&self, kind: TransportKind, id: ClientId) {
        tokio::time::sleep(self.initial_phase()).await;

        loop {
            let Some(handle) = self.registry.get(kind, id) else {
                break;
            };
            if !handle.is_live() {
                self.registry.take(kind, id);
                tracing::debug!(kind = %kind, client_id = %id, "Client gone, timer stopped");
                break;
            }

            self.stats.add_tick();
            let outcome = self.broadcaster.deliver_one(id, &handle, self.factory.create());
            drop(handle);
            if outcome == Err(DeliveryError::Closed) {
                break;
            }

            tokio::time::sleep(self.next_gap()).await;
        }
    }

    fn initial_phase(&self) -> Duration {
        self.jitter.initial_phase(&mut rand::thread_rng())
    }

    fn next_gap(&self) -> Duration {
        self.jitter.next_gap(&mut rand::thread_rng())
    }
}
