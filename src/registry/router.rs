//! Message router
//!
//! Maps endpoint ids to the inbound queue (mailbox) of the task that owns
//! the endpoint. Any task may deliver to any endpoint; the payload is
//! queued and processed later by the owning task, so the receiving side
//! stays single-threaded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::config::RegistryConfig;
use super::endpoint::EndpointId;
use super::error::RouterError;

/// Inbound queue of a single endpoint
///
/// Dropping the mailbox makes the endpoint unreachable: later deliveries
/// fail with [`RouterError::UnknownEndpoint`] and the stale entry is evicted.
#[derive(Debug)]
pub struct Mailbox {
    id: EndpointId,
    rx: mpsc::Receiver<Bytes>,
}

impl Mailbox {
    /// The endpoint this mailbox belongs to
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Wait for the next payload
    ///
    /// Returns `None` once the endpoint is unregistered and the queue is empty.
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take a payload if one is queued
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

/// Routes payloads to endpoint mailboxes
pub struct MessageRouter {
    mailboxes: DashMap<EndpointId, mpsc::Sender<Bytes>>,
    next_id: AtomicU64,
    config: RegistryConfig,
}

impl MessageRouter {
    /// Create a router with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a router with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            mailboxes: DashMap::new(),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the router configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Allocate a fresh endpoint and its mailbox
    pub fn register(&self) -> Mailbox {
        let id = EndpointId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.mailbox_capacity);

        self.mailboxes.insert(id, tx);
        tracing::trace!(endpoint = %id, "Endpoint registered");

        Mailbox { id, rx }
    }

    /// Remove an endpoint
    ///
    /// Payloads already queued stay readable from the mailbox.
    pub fn unregister(&self, id: EndpointId) -> bool {
        let removed = self.mailboxes.remove(&id).is_some();
        if removed {
            tracing::trace!(endpoint = %id, "Endpoint unregistered");
        }
        removed
    }

    /// Check if an endpoint is currently registered
    pub fn is_registered(&self, id: EndpointId) -> bool {
        self.mailboxes.contains_key(&id)
    }

    /// Number of registered endpoints
    pub fn len(&self) -> usize {
        self.mailboxes.len()
    }

    /// Check if no endpoint is registered
    pub fn is_empty(&self) -> bool {
        self.mailboxes.is_empty()
    }

    /// Queue a payload for an endpoint without waiting for it to be processed
    ///
    /// An endpoint whose mailbox is full is evicted: its mailbox yields what
    /// is already queued and then `None`.
    pub fn deliver(&self, id: EndpointId, payload: Bytes) -> Result<(), RouterError> {
        // Clone the sender out so no shard lock is held while sending or evicting
        let tx = self
            .mailboxes
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(RouterError::UnknownEndpoint(id))?;

        match tx.try_send(payload) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                // An endpoint that missed a payload must not receive later ones
                self.mailboxes.remove(&id);
                tracing::debug!(endpoint = %id, "Mailbox full, endpoint evicted");
                Err(RouterError::MailboxFull(id))
            }
            Err(TrySendError::Closed(_)) => {
                self.mailboxes.remove_if(&id, |_, tx| tx.is_closed());
                Err(RouterError::UnknownEndpoint(id))
            }
        }
    }

    /// Evict endpoints whose mailbox has been dropped
    ///
    /// Returns the number of evicted endpoints.
    pub fn prune(&self) -> usize {
        let before = self.mailboxes.len();
        self.mailboxes.retain(|_, tx| !tx.is_closed());
        let evicted = before.saturating_sub(self.mailboxes.len());

        if evicted > 0 {
            tracing::debug!(evicted = evicted, "Pruned dead mailboxes");
        }
        evicted
    }

    /// Spawn background prune task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_prune_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let router = Arc::clone(self);
        let interval = router.config.prune_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                router.prune();
            }
        })
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}
