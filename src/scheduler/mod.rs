//! Delivery scheduling
//!
//! Two policies decide when clients receive messages:
//!
//! - [`SchedulingMode::GlobalTick`]: one periodic timer. Each tick builds one
//!   message shared by every stream and socket client and answers every
//!   pending long-poll.
//! - [`SchedulingMode::PerClientJitter`]: every stream and socket client gets
//!   its own timer with a random starting phase and Gaussian gaps; every
//!   long-poll request gets one delayed answer. Each firing builds a fresh
//!   message, so `sendTime` is per client.
//!
//! Per-client timers are attached to the registry entry and aborted on
//! unregister. A firing timer re-checks the registry and the connection
//! before sending.

pub mod config;
pub mod driver;
pub mod jitter;

pub use config::{SchedulerConfig, SchedulingMode};
pub use driver::DeliveryScheduler;
pub use jitter::Jitter;
