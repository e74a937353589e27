//! Statistics for connections and servers

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-connection statistics for the fan-out server
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    /// Bytes read from the peer
    pub bytes_received: u64,
    /// Bytes written to the peer
    pub bytes_sent: u64,
    /// Payloads this connection broadcast
    pub broadcasts: u64,
    /// Deliveries that failed for this connection's broadcasts
    pub failed_deliveries: u64,
    /// Connection duration
    pub duration: Duration,
}

impl ConnectionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive rate in bits per second
    pub fn receive_bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }
}

/// Server-wide statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections ever accepted
    pub total_connections: u64,
    /// Currently open connections
    pub active_connections: u64,
    /// Connections refused by the connection limit
    pub rejected_connections: u64,
    /// Time since the server was created
    pub uptime: Duration,
}

/// Live counters behind [`ServerStats`]
#[derive(Debug)]
pub(crate) struct ServerCounters {
    total: AtomicU64,
    active: AtomicU64,
    rejected: AtomicU64,
    started_at: Instant,
}

impl ServerCounters {
    pub(crate) fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            active: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn connection_opened(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total.load(Ordering::Relaxed),
            active_connections: self.active.load(Ordering::Relaxed),
            rejected_connections: self.rejected.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_stats_new() {
        let stats = ConnectionStats::new();
        assert_eq!(stats.bytes_received, 0);
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.broadcasts, 0);
        assert_eq!(stats.failed_deliveries, 0);
    }

    #[test]
    fn test_receive_bitrate() {
        let mut stats = ConnectionStats::new();
        stats.bytes_received = 1_000_000; // 1 MB
        stats.duration = Duration::from_secs(10);

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(stats.receive_bitrate(), 800_000);
    }

    #[test]
    fn test_receive_bitrate_zero_duration() {
        let mut stats = ConnectionStats::new();
        stats.bytes_received = 1_000_000;

        assert_eq!(stats.receive_bitrate(), 0);
    }

    #[test]
    fn test_server_counters() {
        let counters = ServerCounters::new();
        counters.connection_opened();
        counters.connection_opened();
        counters.connection_closed();
        counters.connection_rejected();

        let stats = counters.snapshot();
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.rejected_connections, 1);
    }
}
