//! HTTP upload server
//!
//! Run with: cargo run --example upload_server [BIND_ADDR] [UPLOAD_DIR]
//!
//! Examples:
//!   cargo run --example upload_server                        # 0.0.0.0:8080, current dir
//!   cargo run --example upload_server localhost /tmp/up      # 127.0.0.1:8080, /tmp/up
//!
//! Upload with curl:
//!   curl --data-binary @big.iso http://localhost:8080/
//!
//! Each request body lands in a new `<9 random letters>.uploaded` file.
//! Stop the server with Ctrl+C or Enter.

use std::net::SocketAddr;

use fanpump::server::DEFAULT_PORT;
use fanpump::{ServerConfig, UploadConfig, UploadServer};
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
    eprintln!("Usage: upload_server [BIND_ADDR] [UPLOAD_DIR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR     Address to bind to (default: 0.0.0.0:8080)");
    eprintln!("  UPLOAD_DIR    Directory for uploaded files (default: .)");
}

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

    let mut upload = UploadConfig::default();
    if let Some(dir) = args.get(2) {
        upload = upload.upload_dir(dir);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fanpump=info".parse()?)
                .add_directive("upload_server=info".parse()?),
        )
        .init();

    tokio::fs::create_dir_all(&upload.upload_dir).await?;

    println!(
        "Starting upload server on {} (files in {})",
        config.bind_addr,
        upload.upload_dir.display()
    );
    println!("Press Enter or Ctrl+C to stop");

    let server = UploadServer::new(config, upload);
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

    Ok(())
}
