//! Registry error types
//!
//! Error types for message routing. Neither fails a broadcast as a whole;
//! the affected endpoint stops receiving and fan-out carries on.

use super::endpoint::EndpointId;

/// Error type for router operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Endpoint is not registered, or its mailbox is already gone
    UnknownEndpoint(EndpointId),
    /// Endpoint's mailbox was at capacity; the endpoint has been evicted
    MailboxFull(EndpointId),
}

impl RouterError {
    /// The endpoint the failed delivery was addressed to
    pub fn endpoint(&self) -> EndpointId {
        match self {
            RouterError::UnknownEndpoint(id) | RouterError::MailboxFull(id) => *id,
        }
    }
}

impl std::fmt::Display for RouterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterError::UnknownEndpoint(id) => write!(f, "Unknown endpoint: {}", id),
            RouterError::MailboxFull(id) => write!(f, "Mailbox full, evicted: {}", id),
        }
    }
}

impl std::error::Error for RouterError {}
