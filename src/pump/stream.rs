//! Stream capabilities consumed by the pump
//!
//! [`FlowControlledSource`] and [`FlowControlledSink`] are the control
//! surfaces a [`PumpSession`](super::PumpSession) drives. Data and
//! completion events travel the other way, as calls into the session.
//! [`ChunkSource`] is the async read side used by the [`Pump`](super::Pump)
//! driver.

use std::future::Future;
use std::io;

use bytes::Bytes;

/// A readable stream that can be paused and resumed
pub trait FlowControlledSource {
    /// Stop producing chunks until [`resume`](Self::resume)
    fn pause(&mut self);

    /// Start or continue producing chunks
    fn resume(&mut self);

    /// Release the source; no further chunks are wanted
    fn close(&mut self);
}

/// A writable stream with a bounded write queue
pub trait FlowControlledSink {
    /// Queue a chunk for writing
    ///
    /// The chunk is always accepted on `Ok`. `Ok(false)` means the write
    /// queue is now full and the caller should wait for a drain.
    fn write(&mut self, chunk: Bytes) -> io::Result<bool>;

    /// Begin closing once queued data is written
    ///
    /// Completion is reported back through
    /// [`PumpSession::on_sink_closed`](super::PumpSession::on_sink_closed).
    fn close(&mut self) -> io::Result<()>;

    /// Discard queued data and release the sink
    fn abort(&mut self);
}

/// Async producer of chunks
///
/// `next_chunk` must be cancel safe: if the future is dropped before it
/// completes, no data may be lost.
pub trait ChunkSource {
    /// Read the next chunk, or `None` at end of stream
    fn next_chunk(&mut self) -> impl Future<Output = io::Result<Option<Bytes>>> + Send;
}
