//! Fan-out broadcast server
//!
//! Run with: cargo run --example fanout_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example fanout_server                    # binds to 0.0.0.0:8080
//!   cargo run --example fanout_server localhost          # binds to 127.0.0.1:8080
//!   cargo run --example fanout_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! Connect a few clients with `nc localhost 8080`. Every line typed in one
//! of them shows up in all of them. Stop the server with Ctrl+C or Enter.

use std::net::SocketAddr;

use fanpump::server::DEFAULT_PORT;
use fanpump::{FanoutServer, ServerConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
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
    eprintln!("Usage: fanout_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8080)");
}

/// Resolves when Enter is pressed or stdin closes
async fn enter_pressed() {
    let mut line = String::new();
    let _ = BufReader::new(tokio::io::stdin()).read_line(&mut line).await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let config = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => ServerConfig::with_addr(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fanpump=info".parse()?)
                .add_directive("fanout_server=info".parse()?),
        )
        .init();

    println!("Starting fan-out server on {}", config.bind_addr);
    println!("Press Enter or Ctrl+C to stop");

    let server = FanoutServer::new(config);
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = enter_pressed() => {}
        }
        println!("\nShutting down...");
    };

    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {}", e);
    }

    let stats = server.stats();
    println!(
        "Served {} connections ({} rejected) in {:?}",
        stats.total_connections, stats.rejected_connections, stats.uptime
    );

    Ok(())
}
