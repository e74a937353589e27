//! Broadcast registry implementation
//!
//! The set of endpoints that opted into fan-out, plus the broadcast loop
//! that hands each payload to the router once per member.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashSet;

use super::config::RegistryConfig;
use super::endpoint::EndpointId;
use super::router::{Mailbox, MessageRouter};

/// Outcome of a single broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members the payload was queued for
    pub delivered: usize,
    /// Members the payload could not be queued for
    pub failed: usize,
}

/// Registry of endpoints that receive broadcasts
///
/// Thread-safe via a sharded `DashSet`, so connection tasks add and remove
/// themselves without contending on a single lock. Shared through an `Arc`
/// created at server startup.
pub struct BroadcastRegistry {
    /// Current members
    members: DashSet<EndpointId>,

    /// Router used to reach members
    router: Arc<MessageRouter>,
}

impl BroadcastRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_router(Arc::new(MessageRouter::with_config(config)))
    }

    /// Create a registry on top of an existing router
    pub fn with_router(router: Arc<MessageRouter>) -> Self {
        Self {
            members: DashSet::new(),
            router,
        }
    }

    /// Get the router
    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Add an endpoint
    ///
    /// Returns `false` if it was already a member.
    pub fn add(&self, id: EndpointId) -> bool {
        self.members.insert(id)
    }

    /// Remove an endpoint
    ///
    /// Returns `false` if it was not a member.
    pub fn remove(&self, id: EndpointId) -> bool {
        self.members.remove(&id).is_some()
    }

    /// Check membership
    pub fn contains(&self, id: EndpointId) -> bool {
        self.members.contains(&id)
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if there are no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Snapshot of the current members
    pub fn members(&self) -> Vec<EndpointId> {
        self.members.iter().map(|id| *id).collect()
    }

    /// Register a new endpoint with the router and add it
    ///
    /// The endpoint stays a member until the returned [`Membership`] is dropped.
    pub fn join(self: &Arc<Self>) -> (Membership, Mailbox) {
        let mailbox = self.router.register();
        let id = mailbox.id();
        self.add(id);

        tracing::debug!(endpoint = %id, members = self.len(), "Endpoint joined");

        let membership = Membership {
            id,
            registry: Arc::clone(self),
        };
        (membership, mailbox)
    }

    /// Deliver a payload to every member not in `excluding`
    ///
    /// Failed deliveries are logged and counted, never propagated. A member
    /// that cannot take the payload leaves the registry, so no member ever
    /// sees a gap. Members added while the broadcast runs may or may not
    /// receive the payload.
    pub fn broadcast(&self, payload: Bytes, excluding: &[EndpointId]) -> BroadcastReport {
        // Snapshot first so no shard lock is held while routing
        let targets = self.members();
        let mut report = BroadcastReport::default();

        for id in targets {
            if excluding.contains(&id) {
                continue;
            }

            match self.router.deliver(id, payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    self.remove(id);
                    tracing::debug!(endpoint = %id, error = %e, "Member dropped from broadcast");
                }
            }
        }

        report
    }
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry membership of one endpoint
///
/// Dropping it removes the endpoint from the registry and the router, so
/// cleanup runs on every exit path of the owning task.
pub struct Membership {
    id: EndpointId,
    registry: Arc<BroadcastRegistry>,
}

impl Membership {
    /// The member endpoint
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// The registry this membership belongs to
    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.registry.remove(self.id);
        self.registry.router.unregister(self.id);

        tracing::debug!(
            endpoint = %self.id,
            members = self.registry.len(),
            "Endpoint left"
        );
    }
}

impl std::fmt::Debug for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership").field("id", &self.id).finish()
    }
}
