//! Async pump driver
//!
//! Runs a [`PumpSession`] against real I/O inside one task. Each loop turn
//! waits on whichever of these is enabled and feeds the result back into
//! the session:
//!
//! - the next chunk from the source, only while the session keeps it flowing
//! - a write of the chunk at the head of the sink's queue
//! - the cancellation future
//!
//! A paused pump simply stops polling its source, so nothing is buffered
//! beyond the sink's high-water mark plus one read.

use std::future::Future;
use std::io;

use bytes::{Buf, Bytes};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;

use super::config::PumpConfig;
use super::error::{Stage, StreamError};
use super::io::{ReadGate, ReaderChunks, WriteQueue};
use super::session::{PumpSession, PumpSummary};
use super::stream::ChunkSource;

enum Event {
    Cancelled,
    Written(io::Result<usize>),
    Read(io::Result<Option<Bytes>>),
}

/// Streams a [`ChunkSource`] into an `AsyncWrite` under backpressure
///
/// # Example
/// ```no_run
/// use fanpump::pump::{Pump, PumpConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let input = tokio::fs::File::open("in.bin").await?;
/// let output = tokio::fs::File::create("out.bin").await?;
///
/// let summary = Pump::from_reader(input, output, PumpConfig::default()).run().await?;
/// println!("{} bytes in {} ms", summary.bytes_pumped, summary.duration_millis());
/// # Ok(())
/// # }
/// ```
pub struct Pump<S, W> {
    source: S,
    writer: W,
    config: PumpConfig,
}

impl<R, W> Pump<ReaderChunks<R>, W> {
    /// Pump from an `AsyncRead`, reading `config.chunk_size` bytes at a time
    pub fn from_reader(reader: R, writer: W, config: PumpConfig) -> Self {
        let source = ReaderChunks::new(reader, config.chunk_size);
        Self::with_config(source, writer, config)
    }
}

impl<S, W> Pump<S, W> {
    /// Create a pump with default configuration
    pub fn new(source: S, writer: W) -> Self {
        Self::with_config(source, writer, PumpConfig::default())
    }

    /// Create a pump with custom configuration
    pub fn with_config(source: S, writer: W, config: PumpConfig) -> Self {
        Self {
            source,
            writer,
            config,
        }
    }
}

impl<S, W> Pump<S, W>
where
    S: ChunkSource,
    W: AsyncWrite + Unpin,
{
    /// Run until the source ends and the writer is shut down, or until failure
    pub async fn run(self) -> Result<PumpSummary, StreamError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run like [`run`](Self::run), failing with a cancellation once `cancel` resolves
    pub async fn run_until<F>(self, cancel: F) -> Result<PumpSummary, StreamError>
    where
        F: Future<Output = ()>,
    {
        let Pump {
            mut source,
            mut writer,
            config,
        } = self;

        let (tx, mut rx) = oneshot::channel();
        let mut session = PumpSession::new(ReadGate::new(), WriteQueue::new(config.high_water_mark));
        session.on_complete(move |outcome| {
            let _ = tx.send(outcome);
        });

        let started = session.start();
        debug_assert!(started.is_ok(), "fresh session refused to start");

        tokio::pin!(cancel);
        let mut in_flight: Option<Bytes> = None;
        let mut ended = false;

        while !session.state().is_terminal() {
            if in_flight.is_none() {
                in_flight = session.sink_mut().pop_front();
            }

            if in_flight.is_none() && session.sink().close_requested() {
                let closed = tokio::select! {
                    biased;
                    _ = &mut cancel => None,
                    result = writer.shutdown() => Some(result),
                };
                match closed {
                    Some(result) => session.on_sink_closed(result),
                    None => session.cancel(),
                }
                continue;
            }

            let reading = !ended && session.source().is_flowing();
            let event = tokio::select! {
                biased;
                _ = &mut cancel => Event::Cancelled,
                written = write_some(&mut writer, in_flight.as_ref()), if in_flight.is_some() => {
                    Event::Written(written)
                }
                chunk = source.next_chunk(), if reading => Event::Read(chunk),
            };

            match event {
                Event::Cancelled => session.cancel(),
                Event::Written(Ok(0)) => session.on_sink_error(io::ErrorKind::WriteZero.into()),
                Event::Written(Ok(n)) => {
                    if let Some(chunk) = in_flight.as_mut() {
                        chunk.advance(n);
                        if chunk.is_empty() {
                            in_flight = None;
                        }
                    }
                    if session.sink_mut().acknowledge(n) {
                        session.on_drain();
                    }
                }
                Event::Written(Err(e)) => session.on_sink_error(e),
                Event::Read(Ok(Some(chunk))) => session.on_data(chunk),
                Event::Read(Ok(None)) => {
                    ended = true;
                    session.on_end();
                }
                Event::Read(Err(e)) => session.on_source_error(e),
            }
        }

        // The completion callback fires on the transition to a terminal state
        rx.try_recv()
            .unwrap_or_else(|_| Err(StreamError::cancelled(Stage::Read)))
    }
}

/// Single write of `chunk`; cancel safe, pending forever without a chunk
async fn write_some<W>(writer: &mut W, chunk: Option<&Bytes>) -> io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    match chunk {
        Some(chunk) => writer.write(chunk).await,
        None => std::future::pending().await,
    }
}
