//! Crate-level error type
//!
//! Module errors ([`RouterError`](crate::registry::RouterError),
//! [`PumpError`](crate::pump::PumpError), [`StreamError`](crate::pump::StreamError))
//! are reported where they occur and never escape a server; this enum covers
//! what a server's `run` can fail with.

/// Result alias used by the server layer
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for fanpump servers
#[derive(Debug)]
pub enum Error {
    /// Binding or inspecting the listening socket failed
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
