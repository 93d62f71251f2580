//! Benchmark server listener
//!
//! Binds the HTTP listener, starts the hub's background tasks and serves the
//! routes until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::hub::BenchHub;
use crate::server::config::ServerConfig;
use crate::server::routes;

/// Push latency benchmark server
pub struct BenchServer {
    config: ServerConfig,
    hub: Arc<BenchHub>,
}

impl BenchServer {
    /// Create a new server with the given configuration
    ///
    /// Fails if the scheduler configuration is invalid.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let hub = BenchHub::new(&config)?;

        Ok(Self {
            config,
            hub: Arc::new(hub),
        })
    }

    /// Get a reference to the hub
    pub fn hub(&self) -> &Arc<BenchHub> {
        &self.hub
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    ///
    /// A fatal persistence failure also stops the server and is returned.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut tasks = self
            .hub
            .spawn_background()
            .ok_or_else(|| Error::Config("server is already running".into()))?;

        tracing::info!(
            addr = %listener.local_addr()?,
            payload_size = self.config.payload_size,
            mode = ?self.hub.scheduler().mode(),
            log = %self.hub.log_path().display(),
            "Benchmark server listening"
        );

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let app = routes::router(Arc::clone(&self.hub));
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        let mut server_result = None;
        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            joined = &mut server => {
                let joined = flatten_server(joined);
                server_result = Some(joined);
                Ok(())
            }
            result = tasks.writer_stopped() => {
                if let Err(ref e) = result {
                    tracing::error!(error = %e, "Persistence writer stopped");
                }
                result
            }
        };

        // Open streams and polls would otherwise hold the graceful shutdown
        let _ = stop_tx.send(());
        self.hub.close_clients();

        let server_result = match server_result {
            Some(joined) => joined,
            None => flatten_server(server.await),
        };
        let flushed = tasks.shutdown().await;

        let stats = self.hub.stats();
        tracing::info!(
            ticks = stats.ticks,
            delivered = stats.delivered,
            records_written = stats.records_written,
            records_lost = stats.records_lost,
            "Benchmark server stopped"
        );

        result.and(server_result).and(flushed)
    }
}

fn flatten_server(
    joined: std::result::Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match joined {
        Ok(result) => result.map_err(Error::from),
        Err(e) => Err(Error::Io(std::io::Error::other(e))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::persistence::{FailurePolicy, PersistenceConfig};

    async fn request(addr: SocketAddr, method: &str, path: &str, body: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn config(dir: &std::path::Path) -> ServerConfig {
        ServerConfig::default()
            .payload_size(8)
            .interval(Duration::from_millis(20))
            .persistence(PersistenceConfig::default().fixed_file(dir.join("LogReply.csv")))
    }

    #[tokio::test]
    async fn test_serve_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(BenchServer::new(config(dir.path())).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let running = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .serve(listener, async move {
                        let _ = stop_rx.await;
                    })
                    .await
            })
        };

        let polled = request(addr, "POST", "/lp", "").await;
        assert!(polled.starts_with("HTTP/1.1 200"));
        assert!(polled.to_lowercase().contains("cache-control: no-cache"));

        let body = polled.split("\r\n\r\n").nth(1).unwrap();
        let message: crate::message::Message = serde_json::from_str(body).unwrap();
        assert_eq!(message.payload.len(), 8);

        let ack = format!(
            r#"{{"timestamp":"{}","protocol":"lp","sendTime":{}}}"#,
            message.timestamp.to_rfc3339(),
            message.send_time
        );
        let returned = request(addr, "POST", "/return", &ack).await;
        assert!(returned.starts_with("HTTP/1.1 200"));

        let rejected = request(addr, "POST", "/return", "{").await;
        assert!(rejected.starts_with("HTTP/1.1 400"));

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();

        // Final flush on shutdown
        let log = std::fs::read_to_string(dir.path().join("LogReply.csv")).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains(";lp;"));
    }

    #[tokio::test]
    async fn test_shutdown_answers_pending_polls() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).interval(Duration::from_secs(3600));
        let server = Arc::new(BenchServer::new(config).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let running = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .serve(listener, async move {
                        let _ = stop_rx.await;
                    })
                    .await
            })
        };

        // Let the first tick pass so the poll waits for the next one
        tokio::time::sleep(Duration::from_millis(50)).await;
        let polled = tokio::spawn(request(addr, "POST", "/lp", ""));
        while server.hub().registry().counts().lp == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();

        assert!(polled.await.unwrap().starts_with("HTTP/1.1 503"));
    }

    #[tokio::test]
    async fn test_fatal_writer_stops_server() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let config = config(dir.path()).persistence(
            PersistenceConfig::default()
                .fixed_file(blocker.join("LogReply.csv"))
                .initial_delay(Duration::ZERO)
                .failure_policy(FailurePolicy::Fatal),
        );
        let server = BenchServer::new(config).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = server.serve(listener, std::future::pending()).await;
        assert!(matches!(result, Err(Error::Persistence { .. })));
    }

    #[tokio::test]
    async fn test_serve_twice_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let server = BenchServer::new(config(dir.path())).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        server.serve(listener, async {}).await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let result = server.serve(listener, async {}).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
