//! Push latency benchmark harness
//!
//! Measures how long a message pushed by the server takes to come back from a
//! client over three transports:
//!
//! - Server-sent events (`GET /sse`)
//! - WebSocket (`GET /ws`)
//! - Long-polling (`POST /lp`)
//!
//! Every message carries the monotonic instant it was built at. Clients echo
//! that value to `POST /return`; the difference from the receipt instant is
//! queued and periodically appended to a `;`-delimited log.
//!
//! # Example
//!
//! ```no_run
//! use push_latency::{BenchServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> push_latency::Result<()> {
//!     let config = ServerConfig::default().payload_size(64);
//!     let server = BenchServer::new(config)?;
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```

pub mod broadcaster;
pub mod error;
pub mod hub;
pub mod latency;
pub mod message;
pub mod persistence;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use hub::BenchHub;
pub use message::{Message, TransportKind};
pub use persistence::{FailurePolicy, LogTarget, PersistenceConfig};
pub use scheduler::{SchedulerConfig, SchedulingMode};
pub use server::{BenchServer, ServerConfig};
