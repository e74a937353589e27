//! Fan-out broadcast and flow-controlled streaming for tokio servers
//!
//! This crate provides two building blocks and the servers that exercise them:
//!
//! - [`registry`]: a concurrently-mutable set of addressable endpoints with a
//!   router that delivers payloads into per-connection mailboxes
//! - [`pump`]: a backpressure-aware pump that moves bytes from a readable
//!   source to a writable sink, pausing the source while the sink is saturated
//! - [`server`]: a fan-out TCP server and an HTTP upload server built on them
//!
//! # Example
//!
//! ```no_run
//! use fanpump::{FanoutServer, ServerConfig};
//!
//! # async fn example() -> fanpump::Result<()> {
//! let server = FanoutServer::new(ServerConfig::default());
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod pump;
pub mod registry;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use pump::{Pump, PumpConfig, PumpSession, PumpState, PumpSummary, StreamError};
pub use registry::{BroadcastRegistry, EndpointId, Mailbox, MessageRouter, RegistryConfig};
pub use server::{FanoutServer, ServerConfig, UploadConfig, UploadServer};
