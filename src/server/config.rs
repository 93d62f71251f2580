//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::persistence::PersistenceConfig;
use crate::scheduler::{SchedulerConfig, SchedulingMode};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 7070;

/// Default per-client message buffer
pub const DEFAULT_CLIENT_BUFFER: usize = 16;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Size of the random payload carried by every message, in bytes
    pub payload_size: usize,

    /// Messages buffered per stream or socket client before new ones are
    /// dropped
    pub client_buffer: usize,

    /// Delivery timing
    pub scheduler: SchedulerConfig,

    /// Latency log output
    pub persistence: PersistenceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            payload_size: 0,
            client_buffer: DEFAULT_CLIENT_BUFFER,
            scheduler: SchedulerConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the payload size
    pub fn payload_size(mut self, size: usize) -> Self {
        self.payload_size = size;
        self
    }

    /// Set the per-client buffer (at least one message)
    pub fn client_buffer(mut self, capacity: usize) -> Self {
        self.client_buffer = capacity.max(1);
        self
    }

    /// Set the base delivery interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.scheduler = self.scheduler.interval(interval);
        self
    }

    /// Switch to per-client jittered delivery
    pub fn jittered(mut self) -> Self {
        self.scheduler = self.scheduler.mode(SchedulingMode::PerClientJitter);
        self
    }

    /// Replace the scheduler configuration
    pub fn scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Replace the persistence configuration
    pub fn persistence(mut self, persistence: PersistenceConfig) -> Self {
        self.persistence = persistence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::LogTarget;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 7070);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.payload_size, 0);
        assert_eq!(config.client_buffer, DEFAULT_CLIENT_BUFFER);
        assert_eq!(config.scheduler.mode, SchedulingMode::GlobalTick);
        assert_eq!(config.scheduler.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn test_builder_client_buffer_floor() {
        let config = ServerConfig::default().client_buffer(0);

        assert_eq!(config.client_buffer, 1);
    }

    #[test]
    fn test_builder_jittered() {
        let config = ServerConfig::default().jittered();

        assert_eq!(config.scheduler.mode, SchedulingMode::PerClientJitter);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:7071".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .payload_size(64)
            .client_buffer(4)
            .interval(Duration::from_millis(250))
            .persistence(PersistenceConfig::default().fixed_file("out.csv"));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.payload_size, 64);
        assert_eq!(config.client_buffer, 4);
        assert_eq!(config.scheduler.interval, Duration::from_millis(250));
        assert_eq!(config.persistence.target, LogTarget::Fixed("out.csv".into()));
    }
}
