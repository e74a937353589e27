//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::pump::PumpConfig;

/// Default listening port of both servers
pub const DEFAULT_PORT: u16 = 8080;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size
    pub read_buffer_size: usize,

    /// Whether a fan-out connection receives its own broadcasts
    pub echo_to_sender: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,
            read_buffer_size: 64 * 1024, // 64KB
            echo_to_sender: true,
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

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the read buffer size (at least 1 byte)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Choose whether senders receive their own broadcasts
    pub fn echo_to_sender(mut self, echo: bool) -> Self {
        self.echo_to_sender = echo;
        self
    }
}

/// Upload server options
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory uploaded files are created in
    pub upload_dir: PathBuf,

    /// Number of random letters in a generated file name
    pub name_len: usize,

    /// Suffix appended to generated file names
    pub suffix: String,

    /// Flow control for request body to file
    pub pump: PumpConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("."),
            name_len: 9,
            suffix: ".uploaded".to_string(),
            pump: PumpConfig::default(),
        }
    }
}

impl UploadConfig {
    /// Set the upload directory
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Set the generated name length (at least 1)
    pub fn name_len(mut self, len: usize) -> Self {
        self.name_len = len.max(1);
        self
    }

    /// Set the file name suffix
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the pump configuration
    pub fn pump(mut self, pump: PumpConfig) -> Self {
        self.pump = pump;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.read_buffer_size, 64 * 1024);
        assert!(config.tcp_nodelay);
        assert!(config.echo_to_sender);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_builder_read_buffer_floor() {
        let config = ServerConfig::default().read_buffer_size(0);

        assert_eq!(config.read_buffer_size, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .read_buffer_size(4096)
            .echo_to_sender(false);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.read_buffer_size, 4096);
        assert!(!config.echo_to_sender);
    }

    #[test]
    fn test_default_upload_config() {
        let config = UploadConfig::default();

        assert_eq!(config.upload_dir, PathBuf::from("."));
        assert_eq!(config.name_len, 9);
        assert_eq!(config.suffix, ".uploaded");
    }

    #[test]
    fn test_upload_builder() {
        let config = UploadConfig::default()
            .upload_dir("/tmp/uploads")
            .name_len(0)
            .suffix(".bin")
            .pump(PumpConfig::default().chunk_size(1024));

        assert_eq!(config.upload_dir, PathBuf::from("/tmp/uploads"));
        assert_eq!(config.name_len, 1);
        assert_eq!(config.suffix, ".bin");
        assert_eq!(config.pump.chunk_size, 1024);
    }
}
