//! Fan-out TCP server
//!
//! Every byte a client sends is broadcast to all connected clients
//! (including the sender unless [`ServerConfig::echo_to_sender`] is off).
//! Each connection runs in its own task and owns its registry membership.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use super::config::ServerConfig;
use super::shutdown::{self, ShutdownSignal};
use crate::error::Result;
use crate::registry::{BroadcastRegistry, EndpointId, Mailbox, Membership, RegistryConfig};
use crate::stats::{ConnectionStats, ServerCounters, ServerStats};

/// Fan-out broadcast server
pub struct FanoutServer {
    config: ServerConfig,
    registry: Arc<BroadcastRegistry>,
    counters: Arc<ServerCounters>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl FanoutServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        Self::with_registry(config, Arc::new(BroadcastRegistry::with_config(registry_config)))
    }

    /// Create a new server on an existing registry
    pub fn with_registry(config: ServerConfig, registry: Arc<BroadcastRegistry>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            registry,
            counters: Arc::new(ServerCounters::new()),
            connection_semaphore,
        }
    }

    /// Get a reference to the broadcast registry
    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    /// Get a statistics snapshot
    pub fn stats(&self) -> ServerStats {
        self.counters.snapshot()
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails to bind.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve an already bound listener until `shutdown` resolves
    ///
    /// Open connections are closed on shutdown.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %listener.local_addr()?, "Fan-out server listening");

        // Evict mailboxes of tasks that died without cleaning up
        let prune_handle = self.registry.router().spawn_prune_task();
        let (trigger, signal) = shutdown::channel();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener, &signal) => result,
        };

        trigger.trigger();
        prune_handle.abort();

        result
    }

    async fn accept_loop(&self, listener: &TcpListener, signal: &ShutdownSignal) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr, signal.clone());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr, signal: ShutdownSignal) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    self.counters.connection_rejected();
                    return;
                }
            }
        } else {
            None
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        // Join at accept time; the membership leaves when the task ends
        let (membership, mailbox) = self.registry.join();
        self.counters.connection_opened();

        tracing::debug!(
            endpoint = %membership.id(),
            peer = %peer_addr,
            "New connection"
        );

        let mut connection = FanoutConnection {
            membership,
            mailbox,
            socket,
            config: self.config.clone(),
            stats: ConnectionStats::new(),
        };
        let counters = Arc::clone(&self.counters);

        tokio::spawn(async move {
            let _permit = permit;
            let id = connection.membership.id();

            if let Err(e) = connection.run(signal).await {
                tracing::debug!(endpoint = %id, error = %e, "Connection error");
            }

            tracing::debug!(
                endpoint = %id,
                peer = %peer_addr,
                bytes_received = connection.stats.bytes_received,
                bytes_sent = connection.stats.bytes_sent,
                broadcasts = connection.stats.broadcasts,
                failed_deliveries = connection.stats.failed_deliveries,
                duration_ms = connection.stats.duration.as_millis() as u64,
                receive_bps = connection.stats.receive_bitrate(),
                "Connection closed"
            );
            counters.connection_closed();
        });
    }
}

enum ConnectionEvent {
    Shutdown,
    Read(io::Result<usize>),
    Message(Option<Bytes>),
}

/// One accepted fan-out client
struct FanoutConnection {
    membership: Membership,
    mailbox: Mailbox,
    socket: TcpStream,
    config: ServerConfig,
    stats: ConnectionStats,
}

impl FanoutConnection {
    async fn run(&mut self, shutdown: ShutdownSignal) -> io::Result<()> {
        let started = Instant::now();
        let result = self.serve(shutdown).await;
        self.stats.duration = started.elapsed();
        result
    }

    async fn serve(&mut self, shutdown: ShutdownSignal) -> io::Result<()> {
        let id = self.membership.id();
        let registry = Arc::clone(self.membership.registry());
        let excluding: Vec<EndpointId> = if self.config.echo_to_sender {
            Vec::new()
        } else {
            vec![id]
        };

        let read_size = self.config.read_buffer_size;
        let mut buf = BytesMut::with_capacity(read_size);
        let (mut reader, mut writer) = self.socket.split();

        let shutdown = shutdown.wait();
        tokio::pin!(shutdown);

        loop {
            buf.reserve(read_size);

            let event = tokio::select! {
                _ = &mut shutdown => ConnectionEvent::Shutdown,
                read = reader.read_buf(&mut buf) => ConnectionEvent::Read(read),
                message = self.mailbox.recv() => ConnectionEvent::Message(message),
            };

            match event {
                ConnectionEvent::Shutdown => return Ok(()),
                ConnectionEvent::Read(Ok(0)) => return Ok(()),
                ConnectionEvent::Read(Ok(n)) => {
                    self.stats.bytes_received += n as u64;
                    self.stats.broadcasts += 1;

                    let report = registry.broadcast(buf.split().freeze(), &excluding);
                    self.stats.failed_deliveries += report.failed as u64;
                }
                ConnectionEvent::Read(Err(e)) => return Err(e),
                ConnectionEvent::Message(Some(payload)) => {
                    writer.write_all(&payload).await?;
                    self.stats.bytes_sent += payload.len() as u64;
                }
                // Evicted for falling behind; close rather than skip data
                ConnectionEvent::Message(None) => {
                    tracing::debug!(endpoint = %id, "Mailbox closed, dropping connection");
                    return Ok(());
                }
            }
        }
    }
}
