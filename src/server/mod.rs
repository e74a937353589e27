//! Servers built on the registry and the pump
//!
//! - [`FanoutServer`]: TCP server relaying each client's bytes to every client
//! - [`UploadServer`]: HTTP server streaming each request body into a new file

pub mod config;
pub mod fanout;
pub(crate) mod shutdown;
pub mod upload;

pub use config::{ServerConfig, UploadConfig, DEFAULT_PORT};
pub use fanout::FanoutServer;
pub use upload::UploadServer;
