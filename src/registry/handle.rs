//! Client handles
//!
//! A [`ClientHandle`] is the registry's view of one subscriber. Stream and
//! socket handles feed a bounded channel drained by the connection task, which
//! owns the actual network I/O. A deferred-poll handle is a set-once cell
//! answered exactly once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::message::{Message, TransportKind};

use super::error::DeliveryError;

/// Process-unique client identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sender side of a long-lived push connection
#[derive(Debug, Clone)]
pub struct PushHandle {
    tx: mpsc::Sender<Message>,
}

impl PushHandle {
    /// Create a handle and the receiver the connection task drains
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    fn deliver(&self, message: Message) -> Result<(), DeliveryError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Single-resolution cell answering one long-poll request
#[derive(Debug, Clone)]
pub struct DeferredPollHandle {
    slot: Arc<Mutex<Option<oneshot::Sender<Message>>>>,
}

impl DeferredPollHandle {
    /// Create a handle and the future the request handler awaits
    pub fn pair() -> (Self, PendingPoll) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (handle, PendingPoll { rx })
    }

    /// Answer the request
    ///
    /// Only the first call delivers; later calls return
    /// [`DeliveryError::AlreadyResolved`] and have no effect.
    pub fn resolve(&self, message: Message) -> Result<(), DeliveryError> {
        let tx = self
            .slot
            .lock()
            .take()
            .ok_or(DeliveryError::AlreadyResolved)?;
        tx.send(message).map_err(|_| DeliveryError::Closed)
    }

    /// Whether the request is still waiting and its caller still listening
    pub fn is_live(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .map_or(false, |tx| !tx.is_closed())
    }
}

/// Future completing with the message that answers a long-poll request
///
/// Yields `None` if the handle was dropped without being resolved (for
/// example on shutdown).
#[derive(Debug)]
pub struct PendingPoll {
    rx: oneshot::Receiver<Message>,
}

impl Future for PendingPoll {
    type Output = Option<Message>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

/// Registry handle, one variant per transport
#[derive(Debug, Clone)]
pub enum ClientHandle {
    /// Server-sent event stream
    Stream(PushHandle),
    /// WebSocket
    Socket(PushHandle),
    /// Pending long-poll request
    DeferredPoll(DeferredPollHandle),
}

impl ClientHandle {
    /// Create a stream handle with its connection-side receiver
    pub fn stream(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (handle, rx) = PushHandle::channel(capacity);
        (ClientHandle::Stream(handle), rx)
    }

    /// Create a socket handle with its connection-side receiver
    pub fn socket(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (handle, rx) = PushHandle::channel(capacity);
        (ClientHandle::Socket(handle), rx)
    }

    /// Create a deferred-poll handle with the future its request awaits
    pub fn deferred_poll() -> (Self, PendingPoll) {
        let (handle, pending) = DeferredPollHandle::pair();
        (ClientHandle::DeferredPoll(handle), pending)
    }

    /// Transport this handle belongs to
    pub fn kind(&self) -> TransportKind {
        match self {
            ClientHandle::Stream(_) => TransportKind::Sse,
            ClientHandle::Socket(_) => TransportKind::Ws,
            ClientHandle::DeferredPoll(_) => TransportKind::Lp,
        }
    }

    /// Hand a message to the client without blocking
    pub fn deliver(&self, message: Message) -> Result<(), DeliveryError> {
        match self {
            ClientHandle::Stream(h) | ClientHandle::Socket(h) => h.deliver(message),
            ClientHandle::DeferredPoll(h) => h.resolve(message),
        }
    }

    /// Whether a delivery could still reach the client
    pub fn is_live(&self) -> bool {
        match self {
            ClientHandle::Stream(h) | ClientHandle::Socket(h) => h.is_live(),
            ClientHandle::DeferredPoll(h) => h.is_live(),
        }
    }
}
