//! Endpoint registry for fan-out messaging
//!
//! The registry tracks which connections receive broadcasts; the router
//! delivers a payload to one endpoint by address, from any task.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<BroadcastRegistry>
//!                     ┌─────────────────────────┐
//!                     │ members: DashSet<Id>    │
//!                     │ router: MessageRouter { │
//!                     │   mailboxes: DashMap<   │
//!                     │     Id, mpsc::Sender>   │
//!                     │ }                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!   [Connection #1]         [Connection #2]         [Connection #3]
//!   socket.read()           mailbox.recv()          mailbox.recv()
//!         │                       │                       │
//!         └──► registry.broadcast()──► router.deliver() ──► TCP
//! ```
//!
//! Each connection owns its [`Mailbox`], so payloads are processed by the
//! task that owns the socket. `Bytes` is reference-counted: every member
//! shares one allocation per broadcast.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod router;
pub mod store;

pub use config::RegistryConfig;
pub use endpoint::EndpointId;
pub use error::RouterError;
pub use router::{Mailbox, MessageRouter};
pub use store::{BroadcastRegistry, BroadcastReport, Membership};
