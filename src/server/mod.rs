//! HTTP server
//!
//! [`BenchServer`] owns a [`BenchHub`](crate::hub::BenchHub) and exposes it
//! over axum: server-sent events, WebSocket and long-poll delivery plus the
//! `/return` acknowledgment endpoint.

pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::BenchServer;
