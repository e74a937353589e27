//! Fan-out server tests over loopback TCP

use std::sync::Arc;
use std::time::Duration;

use fanpump::{BroadcastRegistry, FanoutServer, RegistryConfig, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

struct TestServer {
    server: Arc<FanoutServer>,
    addr: std::net::SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<fanpump::Result<()>>,
}

impl TestServer {
    async fn start(config: ServerConfig) -> Self {
        Self::start_server(FanoutServer::new(config)).await
    }

    async fn start_server(server: FanoutServer) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(server);
        let (stop, stopped) = oneshot::channel::<()>();

        let handle = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .serve_until(listener, async {
                        let _ = stopped.await;
                    })
                    .await
            })
        };

        Self {
            server,
            addr,
            stop: Some(stop),
            handle,
        }
    }

    fn registry(&self) -> &Arc<BroadcastRegistry> {
        self.server.registry()
    }

    async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        timeout(Duration::from_secs(2), self.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

/// Poll until the registry holds `expected` members
async fn wait_for_members(registry: &BroadcastRegistry, expected: usize) {
    timeout(Duration::from_secs(2), async {
        while registry.len() != expected {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("registry stuck at {} members", registry.len()));
}

async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    timeout(Duration::from_secs(2), stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    buf
}

#[tokio::test]
async fn test_broadcast_reaches_everyone() {
    let server = TestServer::start(ServerConfig::default()).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    wait_for_members(server.registry(), 2).await;

    alice.write_all(b"hello").await.unwrap();

    assert_eq!(read_exactly(&mut alice, 5).await, b"hello");
    assert_eq!(read_exactly(&mut bob, 5).await, b"hello");

    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_leaves_registry() {
    let server = TestServer::start(ServerConfig::default()).await;

    let alice = server.connect().await;
    let mut bob = server.connect().await;
    wait_for_members(server.registry(), 2).await;

    drop(alice);
    wait_for_members(server.registry(), 1).await;
    assert!(server.registry().router().len() <= 1);

    // Broadcasts keep working for the remaining member
    bob.write_all(b"still here").await.unwrap();
    assert_eq!(read_exactly(&mut bob, 10).await, b"still here");

    server.stop().await;
}

#[tokio::test]
async fn test_no_echo_to_sender() {
    let server = TestServer::start(ServerConfig::default().echo_to_sender(false)).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    wait_for_members(server.registry(), 2).await;

    alice.write_all(b"ping").await.unwrap();
    assert_eq!(read_exactly(&mut bob, 4).await, b"ping");

    let mut buf = [0u8; 16];
    let echoed = timeout(Duration::from_millis(100), alice.read(&mut buf)).await;
    assert!(echoed.is_err(), "sender received its own broadcast");

    server.stop().await;
}

#[tokio::test]
async fn test_order_preserved_per_sender() {
    let server = TestServer::start(ServerConfig::default()).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    wait_for_members(server.registry(), 2).await;

    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    alice.write_all(&payload).await.unwrap();

    assert_eq!(read_exactly(&mut bob, payload.len()).await, payload);
    assert_eq!(read_exactly(&mut alice, payload.len()).await, payload);

    server.stop().await;
}

#[tokio::test]
async fn test_connection_limit() {
    let server = TestServer::start(ServerConfig::default().max_connections(1)).await;

    let _alice = server.connect().await;
    wait_for_members(server.registry(), 1).await;

    let mut rejected = server.connect().await;
    let mut buf = [0u8; 1];
    let n = timeout(Duration::from_secs(2), rejected.read(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);

    assert_eq!(n, 0);
    assert_eq!(server.registry().len(), 1);
    assert_eq!(server.server.stats().rejected_connections, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let server = TestServer::start(ServerConfig::default()).await;

    let mut alice = server.connect().await;
    wait_for_members(server.registry(), 1).await;

    let registry = Arc::clone(server.registry());
    server.stop().await;

    let mut buf = [0u8; 1];
    let n = timeout(Duration::from_secs(2), alice.read(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);

    wait_for_members(&registry, 0).await;
}

#[tokio::test]
async fn test_slow_reader_is_dropped_not_skipped() {
    let server = TestServer::start_server(FanoutServer::with_registry_config(
        ServerConfig::default().echo_to_sender(false),
        RegistryConfig::default().mailbox_capacity(4),
    ))
    .await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    wait_for_members(server.registry(), 2).await;

    // Far more than socket buffers plus four queued reads can hold
    let payload: Vec<u8> = (0..32 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    let sent = payload.clone();
    let writer = tokio::spawn(async move {
        alice.write_all(&sent).await.unwrap();
        alice
    });
    let _alice = timeout(Duration::from_secs(10), writer)
        .await
        .unwrap()
        .unwrap();

    // Bob fell behind and was evicted
    wait_for_members(server.registry(), 1).await;

    let mut received = Vec::new();
    timeout(Duration::from_secs(10), bob.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();

    assert!(received.len() < payload.len());
    assert_eq!(received[..], payload[..received.len()], "stream has a gap");

    server.stop().await;
}
