//! HTTP upload server
//!
//! Each request body is streamed into a freshly created file with a random
//! name. The transfer goes through a [`Pump`], so a slow disk pauses reading
//! from the client instead of buffering the body in memory.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use rand::Rng;
use tokio::fs::{File, OpenOptions};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use super::config::{ServerConfig, UploadConfig};
use super::shutdown::{self, ShutdownSignal};
use crate::error::Result;
use crate::pump::{BodyChunks, Pump};
use crate::stats::{ServerCounters, ServerStats};

/// Generate a file name of `len` random uppercase letters followed by `suffix`
pub fn upload_file_name(len: usize, suffix: &str) -> String {
    let mut rng = rand::rng();
    let mut name: String = (0..len)
        .map(|_| char::from(rng.random_range(b'A'..=b'Z')))
        .collect();
    name.push_str(suffix);
    name
}

/// Create a new file, failing if `path` already exists
///
/// A name collision surfaces as [`io::ErrorKind::AlreadyExists`]; an existing
/// upload is never overwritten.
pub async fn create_upload_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

/// Create a randomly named upload file in the configured directory
pub async fn open_upload(config: &UploadConfig) -> io::Result<(PathBuf, File)> {
    let path = config
        .upload_dir
        .join(upload_file_name(config.name_len, &config.suffix));
    let file = create_upload_file(&path).await?;
    Ok((path, file))
}

/// HTTP server storing each request body in its own file
pub struct UploadServer {
    config: ServerConfig,
    upload: Arc<UploadConfig>,
    counters: Arc<ServerCounters>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl UploadServer {
    /// Create a new server
    pub fn new(config: ServerConfig, upload: UploadConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            upload: Arc::new(upload),
            counters: Arc::new(ServerCounters::new()),
            connection_semaphore,
        }
    }

    /// Get the upload configuration
    pub fn upload_config(&self) -> &UploadConfig {
        &self.upload
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
    /// Uploads still in progress at shutdown are cancelled and their partial
    /// files removed.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            addr = %listener.local_addr()?,
            dir = %self.upload.upload_dir.display(),
            "Upload server listening"
        );

        let (trigger, signal) = shutdown::channel();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener, &signal) => result,
        };

        trigger.trigger();
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

        self.counters.connection_opened();
        tracing::debug!(peer = %peer_addr, "New connection");

        let upload = Arc::clone(&self.upload);
        let counters = Arc::clone(&self.counters);

        tokio::spawn(async move {
            let _permit = permit;

            let service = service_fn(move |request| {
                let upload = Arc::clone(&upload);
                let signal = signal.clone();
                async move { Ok::<_, Infallible>(handle_upload(request, &upload, signal).await) }
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(socket), service)
                .await
            {
                tracing::debug!(peer = %peer_addr, error = %e, "Connection error");
            }

            tracing::debug!(peer = %peer_addr, "Connection closed");
            counters.connection_closed();
        });
    }
}

async fn handle_upload(
    request: Request<Incoming>,
    upload: &UploadConfig,
    shutdown: ShutdownSignal,
) -> Response<Full<Bytes>> {
    let (path, file) = match open_upload(upload).await {
        Ok(opened) => opened,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to open upload file");
            return respond(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let source = BodyChunks::new(request.into_body());
    let result = Pump::with_config(source, file, upload.pump.clone())
        .run_until(shutdown.wait())
        .await;

    match result {
        Ok(summary) => {
            tracing::info!(
                file = %path.display(),
                bytes = summary.bytes_pumped,
                elapsed_ms = summary.duration_millis() as u64,
                bytes_per_sec = summary.throughput(),
                "Uploaded {} bytes to {} in {} ms",
                summary.bytes_pumped,
                path.display(),
                summary.duration_millis()
            );
            respond(StatusCode::OK, Bytes::new())
        }
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "Upload failed");

            if let Err(rm) = tokio::fs::remove_file(&path).await {
                tracing::debug!(file = %path.display(), error = %rm, "Failed to remove partial upload");
            }
            respond(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn respond(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}
