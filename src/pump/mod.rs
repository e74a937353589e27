//! Backpressure-aware stream pump
//!
//! Moves bytes from a readable source to a writable sink without letting
//! data pile up in the sink's queue.
//!
//! # Architecture
//!
//! ```text
//!   ChunkSource ──next_chunk()──► Pump (driver task) ──write()──► AsyncWrite
//!                                     │        ▲
//!                           on_data/  │        │ pause/resume,
//!                           on_drain/ ▼        │ write/close
//!                                 PumpSession (state machine)
//!                                 ReadGate + WriteQueue
//! ```
//!
//! [`PumpSession`] holds every transition of the protocol and can be driven
//! directly by anything that implements [`FlowControlledSource`] and
//! [`FlowControlledSink`]. [`Pump`] is the tokio driver used by the servers.

pub mod config;
pub mod driver;
pub mod error;
pub mod io;
pub mod session;
pub mod state;
pub mod stream;

pub use config::PumpConfig;
pub use driver::Pump;
pub use error::{Cause, PumpError, Stage, StreamError};
pub use io::{BodyChunks, ReadGate, ReaderChunks, WriteQueue};
pub use session::{Completion, PumpSession, PumpSummary};
pub use state::PumpState;
pub use stream::{ChunkSource, FlowControlledSink, FlowControlledSource};
