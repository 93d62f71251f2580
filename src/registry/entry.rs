//! Registry entry types

use tokio::task::AbortHandle;

use super::handle::ClientHandle;

/// Entry for a single client in the registry
#[derive(Debug)]
pub struct ClientEntry {
    /// Delivery handle
    pub handle: ClientHandle,

    /// Per-client timer, aborted when the client is unregistered
    pub(super) timer: Option<AbortHandle>,
}

impl ClientEntry {
    pub(super) fn new(handle: ClientHandle) -> Self {
        Self {
            handle,
            timer: None,
        }
    }

    /// Whether a per-client timer is attached
    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Stop the attached timer, if any
    pub(super) fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Number of registered clients per transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientCounts {
    /// Server-sent event streams
    pub sse: usize,
    /// WebSockets
    pub ws: usize,
    /// Pending long-poll requests
    pub lp: usize,
}

impl ClientCounts {
    /// Clients across all transports
    pub fn total(&self) -> usize {
        self.sse + self.ws + self.lp
    }
}
