//! Pump error types

use std::sync::Arc;

use super::state::PumpState;

/// Where a pump failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading from the source
    Read,
    /// Writing to the sink
    Write,
    /// Closing the sink
    Close,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Read => write!(f, "read"),
            Stage::Write => write!(f, "write"),
            Stage::Close => write!(f, "close"),
        }
    }
}

/// Why a pump failed
#[derive(Debug, Clone)]
pub enum Cause {
    /// I/O failure from the source or sink
    Io(Arc<std::io::Error>),
    /// The owner tore the session down
    Cancelled,
}

impl Cause {
    /// Check if the session was cancelled rather than failing on I/O
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Cause::Cancelled)
    }

    /// Get the I/O error kind, if any
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Cause::Io(e) => Some(e.kind()),
            Cause::Cancelled => None,
        }
    }
}

impl From<std::io::Error> for Cause {
    fn from(e: std::io::Error) -> Self {
        Cause::Io(Arc::new(e))
    }
}

/// Terminal failure of a pump session
#[derive(Debug, Clone)]
pub struct StreamError {
    /// Stage the failure happened in
    pub stage: Stage,
    /// Underlying cause
    pub cause: Cause,
}

impl StreamError {
    /// Create a stream error
    pub fn new(stage: Stage, cause: impl Into<Cause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(stage: Stage) -> Self {
        Self {
            stage,
            cause: Cause::Cancelled,
        }
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Cause::Io(e) => write!(f, "{} failed: {}", self.stage, e),
            Cause::Cancelled => write!(f, "cancelled during {}", self.stage),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            Cause::Io(e) => Some(e.as_ref()),
            Cause::Cancelled => None,
        }
    }
}

/// Misuse of the pump API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpError {
    /// Operation not allowed in the current state
    InvalidState(PumpState),
}

impl std::fmt::Display for PumpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PumpError::InvalidState(state) => write!(f, "Invalid pump state: {:?}", state),
        }
    }
}

impl std::error::Error for PumpError {}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_display() {
        let err = StreamError::new(Stage::Close, io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(err.to_string(), "close failed: disk full");

        let err = StreamError::cancelled(Stage::Read);
        assert_eq!(err.to_string(), "cancelled during read");
        assert!(err.cause.is_cancelled());
    }

    #[test]
    fn test_io_kind() {
        let err = StreamError::new(Stage::Write, io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(err.cause.io_kind(), Some(io::ErrorKind::BrokenPipe));
        assert_eq!(StreamError::cancelled(Stage::Write).cause.io_kind(), None);
    }
}
