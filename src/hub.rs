//! Benchmark hub
//!
//! Ties the registry, scheduler, broadcaster, recorder and writer together
//! behind the handful of calls a web layer needs:
//!
//! - [`BenchHub::subscribe_stream`] / [`BenchHub::subscribe_socket`] for
//!   long-lived connections
//! - [`BenchHub::poll`] for a single long-poll request
//! - [`BenchHub::submit_return`] for acknowledgments
//! - [`BenchHub::spawn_background`] to start the tick and flush loops

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{JoinError, JoinHandle};

use crate::broadcaster::{BroadcastReport, Broadcaster};
use crate::error::{Error, Result};
use crate::latency::{LatencyRecorder, ReturnAck, ReturnRecord};
use crate::message::{Message, MessageFactory, TransportKind};
use crate::persistence::PersistenceWriter;
use crate::registry::{ClientGuard, ClientHandle, ClientRegistry, PendingPoll};
use crate::scheduler::{DeliveryScheduler, SchedulingMode};
use crate::server::ServerConfig;
use crate::stats::{BenchStats, StatsSnapshot};

/// A registered stream or socket client
///
/// Messages arrive on [`Subscription::recv`]. Dropping the subscription
/// unregisters the client.
#[derive(Debug)]
pub struct Subscription {
    guard: ClientGuard,
    rx: mpsc::Receiver<Message>,
}

impl Subscription {
    /// Wait for the next message
    ///
    /// Returns `None` once the client has left the registry and any
    /// deliveries already in flight to it have finished.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Transport of this subscription
    pub fn kind(&self) -> TransportKind {
        self.guard.kind()
    }
}

/// A pending long-poll request
///
/// Dropping it before it resolves unregisters the request and cancels its
/// scheduled answer.
#[derive(Debug)]
pub struct PollRequest {
    guard: ClientGuard,
    pending: PendingPoll,
}

impl PollRequest {
    /// Wait for the message answering this request
    ///
    /// Returns `None` if the hub shut down first.
    pub async fn wait(self) -> Option<Message> {
        let PollRequest { guard, pending } = self;
        let message = pending.await;
        drop(guard);
        message
    }
}

/// Handles to the hub's background tasks
pub struct BackgroundTasks {
    tick: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<Result<()>>>,
    shutdown: oneshot::Sender<()>,
}

fn writer_outcome(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(Error::Io(std::io::Error::other(e))),
    }
}

impl BackgroundTasks {
    /// Wait for the writer to stop on its own
    ///
    /// Only completes under a fatal failure policy. Cancel safe.
    pub async fn writer_stopped(&mut self) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return std::future::pending().await;
        };
        let joined = writer.await;
        self.writer = None;
        writer_outcome(joined)
    }

    /// Stop ticking, flush the latency log one last time and wait for it
    pub async fn shutdown(self) -> Result<()> {
        if let Some(tick) = self.tick {
            tick.abort();
        }
        let _ = self.shutdown.send(());

        match self.writer {
            Some(writer) => writer_outcome(writer.await),
            None => Ok(()),
        }
    }
}

/// The benchmark core
pub struct BenchHub {
    registry: Arc<ClientRegistry>,
    scheduler: Arc<DeliveryScheduler>,
    recorder: LatencyRecorder,
    stats: Arc<BenchStats>,
    client_buffer: usize,
    log_path: PathBuf,
    writer: Arc<Mutex<Option<PersistenceWriter>>>,
    started: AtomicBool,
}

impl BenchHub {
    /// Build a hub with a random payload of the configured size
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let factory = MessageFactory::with_random_payload(config.payload_size);
        Self::with_factory(config, factory, Utc::now())
    }

    /// Build a hub around an explicit message factory and run start time
    pub fn with_factory(
        config: &ServerConfig,
        factory: MessageFactory,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        let stats = Arc::new(BenchStats::new());
        let registry = Arc::new(ClientRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry), Arc::clone(&stats)));
        let scheduler = DeliveryScheduler::new(
            config.scheduler.clone(),
            Arc::clone(&registry),
            broadcaster,
            Arc::new(factory),
            Arc::clone(&stats),
        )?;

        let (recorder, queue) = LatencyRecorder::channel(Arc::clone(&stats));
        let log_path = config
            .persistence
            .target
            .resolve(started_at, config.payload_size);
        let writer = PersistenceWriter::new(
            &config.persistence,
            log_path.clone(),
            queue,
            Arc::clone(&stats),
        )?;

        Ok(Self {
            registry,
            scheduler: Arc::new(scheduler),
            recorder,
            stats,
            client_buffer: config.client_buffer,
            log_path,
            writer: Arc::new(Mutex::new(Some(writer))),
            started: AtomicBool::new(false),
        })
    }

    /// Get a reference to the client registry
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Get a reference to the scheduler
    pub fn scheduler(&self) -> &Arc<DeliveryScheduler> {
        &self.scheduler
    }

    /// Latency log location for this run
    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }

    /// Current counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Register a server-sent event client
    pub fn subscribe_stream(&self) -> Subscription {
        let (handle, rx) = ClientHandle::stream(self.client_buffer);
        self.subscribe(handle, rx)
    }

    /// Register a WebSocket client
    pub fn subscribe_socket(&self) -> Subscription {
        let (handle, rx) = ClientHandle::socket(self.client_buffer);
        self.subscribe(handle, rx)
    }

    fn subscribe(&self, handle: ClientHandle, rx: mpsc::Receiver<Message>) -> Subscription {
        let guard = self.registry.register_guarded(handle);
        self.scheduler.attach_client(guard.kind(), guard.id());
        Subscription { guard, rx }
    }

    /// Register a long-poll request
    pub fn poll(&self) -> PollRequest {
        let (handle, pending) = ClientHandle::deferred_poll();
        let guard = self.registry.register_guarded(handle);
        self.scheduler.schedule_poll(guard.id());
        PollRequest { guard, pending }
    }

    /// Record an acknowledgment received now
    pub fn submit_return(&self, ack: &ReturnAck) -> ReturnRecord {
        self.recorder.submit(ack)
    }

    /// Record an acknowledgment received at `received_at` monotonic
    /// nanoseconds
    pub fn submit_return_at(&self, ack: &ReturnAck, received_at: i64) -> ReturnRecord {
        self.recorder.submit_at(ack, received_at)
    }

    /// Fire one global tick by hand
    pub fn tick(&self) -> BroadcastReport {
        self.scheduler.tick()
    }

    /// Write everything queued so far to the latency log
    ///
    /// Returns `Ok(0)` once the writer has moved into its background task.
    pub async fn flush(&self) -> Result<usize> {
        match self.writer.lock().await.as_mut() {
            Some(writer) => writer.flush().await,
            None => Ok(0),
        }
    }

    /// Retire every registered client
    ///
    /// Open streams and sockets end and pending long-polls are answered with
    /// nothing.
    pub fn close_clients(&self) {
        let mut closed = 0;
        for kind in TransportKind::ALL {
            closed += self.registry.drain(kind).len();
        }
        tracing::info!(clients = closed, "Closed all clients");
    }

    /// Start the global tick (if enabled) and the persistence loop
    ///
    /// Returns `None` if the background tasks were already started.
    pub fn spawn_background(&self) -> Option<BackgroundTasks> {
        if self.started.swap(true, Ordering::AcqRel) {
            return None;
        }

        let tick = match self.scheduler.mode() {
            SchedulingMode::GlobalTick => Some(self.scheduler.spawn_global_tick()),
            SchedulingMode::PerClientJitter => None,
        };

        // Waits out a manual flush still holding the writer
        let (shutdown, shutdown_rx) = oneshot::channel();
        let slot = Arc::clone(&self.writer);
        let writer = tokio::spawn(async move {
            let writer = slot.lock().await.take();
            match writer {
                Some(writer) => writer.run(shutdown_rx).await,
                None => Ok(()),
            }
        });

        Some(BackgroundTasks {
            tick,
            writer: Some(writer),
            shutdown,
        })
    }
}
