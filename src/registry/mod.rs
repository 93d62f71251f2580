//! Client registry
//!
//! The registry tracks every connected client, split by transport, and hands
//! out snapshots for delivery.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<ClientRegistry>
//!                 ┌─────────────────────────────────┐
//!                 │ sse: RwLock<HashMap<Id, Entry>> │
//!                 │ ws:  RwLock<HashMap<Id, Entry>> │
//!                 │ lp:  RwLock<HashMap<Id, Entry>> │
//!                 └───────────────┬─────────────────┘
//!                                 │ snapshot()
//!         ┌───────────────────────┼───────────────────────┐
//!         ▼                       ▼                       ▼
//!   ClientHandle::Stream   ClientHandle::Socket   ClientHandle::DeferredPoll
//!   try_send ─► mpsc ─► SSE  try_send ─► mpsc ─► WS   resolve ─► oneshot ─► HTTP
//! ```
//!
//! Connection tasks own the network side and hold a [`ClientGuard`]; when the
//! connection ends the guard drops and the client leaves the registry, which
//! also aborts any per-client timer attached to it.

pub mod entry;
pub mod error;
pub mod handle;
pub mod store;

pub use entry::{ClientCounts, ClientEntry};
pub use error::DeliveryError;
pub use handle::{ClientHandle, ClientId, DeferredPollHandle, PendingPoll, PushHandle};
pub use store::{ClientGuard, ClientRegistry};
