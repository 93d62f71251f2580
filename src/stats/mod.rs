//! Delivery and recording statistics

pub mod metrics;

pub use metrics::{BenchStats, StatsSnapshot};
