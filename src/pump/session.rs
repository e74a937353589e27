//! Pump session state machine
//!
//! A [`PumpSession`] owns a source and a sink and reacts to their events.
//! It performs no I/O of its own: whoever drives it (the [`Pump`](super::Pump)
//! task, or a test) feeds events in, and the session answers by calling
//! `pause`/`resume`/`write`/`close` on the two sides.

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use bytes::Bytes;

use super::error::{Cause, PumpError, Stage, StreamError};
use super::state::PumpState;
use super::stream::{FlowControlledSink, FlowControlledSource};

/// Callback fired once when a session reaches a terminal state
pub type Completion = Box<dyn FnOnce(Result<PumpSummary, StreamError>) + Send>;

/// Result of a completed pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpSummary {
    /// Total bytes accepted by the sink
    pub bytes_pumped: u64,
    /// Wall-clock time from start to sink close
    pub elapsed: Duration,
    /// Times the source was paused
    pub pauses: u64,
    /// Times the source was resumed after a pause
    pub resumes: u64,
}

impl PumpSummary {
    /// Elapsed time in milliseconds
    pub fn duration_millis(&self) -> u128 {
        self.elapsed.as_millis()
    }

    /// Throughput in bytes per second (0 for sub-millisecond pumps)
    pub fn throughput(&self) -> u64 {
        let millis = self.elapsed.as_millis();
        if millis > 0 {
            (u128::from(self.bytes_pumped) * 1000 / millis) as u64
        } else {
            0
        }
    }
}

/// Flow-controlled transfer from one source to one sink
///
/// Single-use: once started it runs to `Completed` or `Failed` exactly once,
/// and the completion callback fires at that moment.
pub struct PumpSession<S, K> {
    source: S,
    sink: K,
    state: PumpState,

    /// Bytes accepted by the sink
    bytes_pumped: u64,

    /// Chunks that arrived while paused, written after the next drain
    held: VecDeque<Bytes>,

    /// Sink close has been requested
    closing: bool,

    pauses: u64,
    resumes: u64,

    started_at: Option<Instant>,
    finished_at: Option<Instant>,

    completion: Option<Completion>,
}

impl<S, K> PumpSession<S, K>
where
    S: FlowControlledSource,
    K: FlowControlledSink,
{
    /// Create an idle session
    pub fn new(source: S, sink: K) -> Self {
        Self {
            source,
            sink,
            state: PumpState::Idle,
            bytes_pumped: 0,
            held: VecDeque::new(),
            closing: false,
            pauses: 0,
            resumes: 0,
            started_at: None,
            finished_at: None,
            completion: None,
        }
    }

    /// Set the completion callback
    ///
    /// Receives the summary on success or the [`StreamError`] on failure.
    pub fn on_complete<F>(&mut self, f: F)
    where
        F: FnOnce(Result<PumpSummary, StreamError>) + Send + 'static,
    {
        self.completion = Some(Box::new(f));
    }

    /// Current state
    pub fn state(&self) -> PumpState {
        self.state
    }

    /// Bytes accepted by the sink so far
    pub fn bytes_pumped(&self) -> u64 {
        self.bytes_pumped
    }

    /// Times the source was paused
    pub fn pause_count(&self) -> u64 {
        self.pauses
    }

    /// Times the source was resumed after a pause
    pub fn resume_count(&self) -> u64 {
        self.resumes
    }

    /// Get the source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get the source mutably
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Get the sink
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Get the sink mutably
    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// Snapshot of progress so far
    pub fn summary(&self) -> PumpSummary {
        let elapsed = match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        };

        PumpSummary {
            bytes_pumped: self.bytes_pumped,
            elapsed,
            pauses: self.pauses,
            resumes: self.resumes,
        }
    }

    /// Start pumping
    ///
    /// Fails with [`PumpError::InvalidState`] unless the session is idle;
    /// a failed call leaves the session untouched.
    pub fn start(&mut self) -> Result<(), PumpError> {
        if self.state != PumpState::Idle {
            return Err(PumpError::InvalidState(self.state));
        }

        self.state = PumpState::Running;
        self.started_at = Some(Instant::now());
        self.source.resume();

        tracing::trace!("Pump started");
        Ok(())
    }

    /// Source produced a chunk
    pub fn on_data(&mut self, chunk: Bytes) {
        match self.state {
            PumpState::Running => self.write_running(chunk),
            PumpState::Paused => {
                // Source had a chunk in flight when it was paused
                self.held.push_back(chunk);
            }
            PumpState::Idle | PumpState::Draining => {
                tracing::warn!(
                    state = ?self.state,
                    len = chunk.len(),
                    "Chunk outside of running pump dropped"
                );
            }
            PumpState::Completed | PumpState::Failed => {
                tracing::trace!(state = ?self.state, "Chunk after termination ignored");
            }
        }
    }

    /// Sink can accept writes again
    pub fn on_drain(&mut self) {
        match self.state {
            PumpState::Paused => {
                // Held chunks go out before the source may produce more
                while let Some(chunk) = self.held.pop_front() {
                    if !self.write_chunk(chunk) {
                        // Saturated again (stay paused) or failed
                        return;
                    }
                }

                self.state = PumpState::Running;
                self.resumes += 1;
                self.source.resume();
            }
            PumpState::Draining if !self.closing => {
                while let Some(chunk) = self.held.pop_front() {
                    if !self.write_chunk(chunk) {
                        // Saturated again (wait for the next drain) or failed
                        return;
                    }
                }
                self.close_sink();
            }
            _ => {
                tracing::trace!(state = ?self.state, "Drain ignored");
            }
        }
    }

    /// Source reached end of stream
    pub fn on_end(&mut self) {
        match self.state {
            PumpState::Running => {
                self.state = PumpState::Draining;
                self.close_sink();
            }
            PumpState::Paused => {
                // Close once the sink drains
                self.state = PumpState::Draining;
            }
            PumpState::Idle => {
                tracing::warn!("End of stream before pump start ignored");
            }
            PumpState::Draining | PumpState::Completed | PumpState::Failed => {
                tracing::trace!(state = ?self.state, "End of stream ignored");
            }
        }
    }

    /// Sink finished closing
    pub fn on_sink_closed(&mut self, result: io::Result<()>) {
        if self.state != PumpState::Draining || !self.closing {
            tracing::trace!(state = ?self.state, "Sink close ignored");
            return;
        }

        match result {
            Ok(()) => self.complete(),
            Err(e) => self.fail(Stage::Close, e.into()),
        }
    }

    /// Source failed
    pub fn on_source_error(&mut self, error: io::Error) {
        self.fail(Stage::Read, error.into());
    }

    /// Sink failed
    pub fn on_sink_error(&mut self, error: io::Error) {
        let stage = if self.closing { Stage::Close } else { Stage::Write };
        self.fail(stage, error.into());
    }

    /// Tear the session down
    ///
    /// Fails a live session with [`Cause::Cancelled`]; no-op once terminal.
    pub fn cancel(&mut self) {
        let stage = match self.state {
            PumpState::Draining if self.closing => Stage::Close,
            PumpState::Draining => Stage::Write,
            _ => Stage::Read,
        };
        self.fail(stage, Cause::Cancelled);
    }

    fn write_running(&mut self, chunk: Bytes) {
        if !self.write_chunk(chunk) && self.state == PumpState::Running {
            self.state = PumpState::Paused;
            self.pauses += 1;
            self.source.pause();
        }
    }

    /// Returns whether the sink still accepts writes
    fn write_chunk(&mut self, chunk: Bytes) -> bool {
        let len = chunk.len() as u64;

        match self.sink.write(chunk) {
            Ok(accepting) => {
                self.bytes_pumped += len;
                accepting
            }
            Err(e) => {
                self.fail(Stage::Write, e.into());
                false
            }
        }
    }

    fn close_sink(&mut self) {
        self.closing = true;
        if let Err(e) = self.sink.close() {
            self.fail(Stage::Close, e.into());
        }
    }

    fn complete(&mut self) {
        self.state = PumpState::Completed;
        self.finished_at = Some(Instant::now());

        let summary = self.summary();
        tracing::debug!(
            bytes = summary.bytes_pumped,
            elapsed_ms = summary.duration_millis() as u64,
            pauses = summary.pauses,
            "Pump completed"
        );

        if let Some(completion) = self.completion.take() {
            completion(Ok(summary));
        }
    }

    fn fail(&mut self, stage: Stage, cause: Cause) {
        if self.state.is_terminal() {
            tracing::trace!(state = ?self.state, stage = %stage, "Failure after termination ignored");
            return;
        }

        let from = self.state;
        self.state = PumpState::Failed;
        self.finished_at = Some(Instant::now());
        self.held.clear();
        self.source.close();
        self.sink.abort();

        let error = StreamError { stage, cause };
        tracing::debug!(
            from = ?from,
            bytes = self.bytes_pumped,
            error = %error,
            "Pump failed"
        );

        if let Some(completion) = self.completion.take() {
            completion(Err(error));
        }
    }
}

impl<S, K> std::fmt::Debug for PumpSession<S, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PumpSession")
            .field("state", &self.state)
            .field("bytes_pumped", &self.bytes_pumped)
            .field("held", &self.held.len())
            .finish()
    }
}
