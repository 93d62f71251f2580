//! Push latency benchmark server
//!
//! Run with: cargo run --example bench_server [PAYLOAD_SIZE] [BIND_ADDR] [--jitter] [--per-run DIR]
//!
//! Examples:
//!   cargo run --example bench_server                        # empty payload, 0.0.0.0:7070
//!   cargo run --example bench_server 1024                   # 1 KiB payload
//!   cargo run --example bench_server 1024 localhost:7071    # binds to 127.0.0.1:7071
//!   cargo run --example bench_server 64 --jitter            # per-client jittered delivery
//!
//! ## Clients
//!
//! Each client echoes every message it receives to `POST /return`:
//!
//! ```text
//! {"timestamp": <message timestamp>, "protocol": "sse" | "ws" | "lp", "sendTime": <message sendTime>}
//! ```
//!
//! - SSE:       curl -N http://localhost:7070/sse
//! - WebSocket: websocat ws://localhost:7070/ws
//! - Long-poll: curl -X POST http://localhost:7070/lp  (repeat after every answer)
//!
//! Round trips are appended to `LogReply.csv` (or a per-run file with
//! `--per-run`) as `timestamp;protocol;nanoseconds`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use push_latency::{BenchServer, PersistenceConfig, ServerConfig};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:7070
/// - "localhost:7071" -> 127.0.0.1:7071
/// - "127.0.0.1" -> 127.0.0.1:7070
/// - "0.0.0.0:7070" -> 0.0.0.0:7070
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 7070;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: bench_server [PAYLOAD_SIZE] [BIND_ADDR] [--jitter] [--per-run DIR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  PAYLOAD_SIZE   Random payload bytes per message (default: 0)");
    eprintln!("  BIND_ADDR      Address to bind to (default: 0.0.0.0:7070)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --jitter       Per-client timers with random phase and Gaussian jitter");
    eprintln!("  --per-run DIR  Write a fresh latency log per run into DIR");
}

fn exit_with_usage(error: &str) -> ! {
    eprintln!("Error: {}", error);
    eprintln!();
    print_usage();
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    let mut positional = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--jitter" => config = config.jittered(),
            "--per-run" => match args.next() {
                Some(dir) => {
                    config = config.persistence(PersistenceConfig::default().per_run(dir));
                }
                None => exit_with_usage("--per-run needs a directory"),
            },
            flag if flag.starts_with("--") => exit_with_usage(&format!("Unknown option: {}", flag)),
            _ => positional.push(arg),
        }
    }

    if let Some(size) = positional.first() {
        match size.parse::<usize>() {
            Ok(size) => config = config.payload_size(size),
            Err(_) => exit_with_usage(&format!("Invalid payload size: '{}'", size)),
        }
    }
    if let Some(addr) = positional.get(1) {
        match parse_bind_addr(addr) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => exit_with_usage(&e),
        }
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("push_latency=debug".parse()?)
                .add_directive("bench_server=debug".parse()?),
        )
        .init();

    let server = Arc::new(BenchServer::new(config)?);

    println!("Starting benchmark server on {}", server.bind_addr());
    println!("Latency log: {}", server.hub().log_path().display());
    println!();

    let reporter = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(10));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let counts = server.hub().registry().counts();
                let stats = server.hub().stats();
                println!(
                    "Stats: clients sse={} ws={} lp={} delivered={} dropped={} written={} pending={}",
                    counts.sse,
                    counts.ws,
                    counts.lp,
                    stats.delivered,
                    stats.dropped,
                    stats.records_written,
                    stats.records_pending(),
                );
            }
        })
    };

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await;
    reporter.abort();

    if let Err(e) = result {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
