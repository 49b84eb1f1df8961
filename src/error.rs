//! Structured error types for the relay.

use std::fmt;
use std::io;

/// Main error type for relay operations
#[derive(Debug)]
pub enum RelayError {
    /// IO error (sockets, record file)
    Io(io::Error),
    /// Configuration file or flag error
    Config(String),
    /// Failed to bind a UDP socket at startup
    Bind { addr: String, source: io::Error },
    /// Record store load or reload failure
    Store(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Io(e) => write!(f, "IO error: {}", e),
            RelayError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RelayError::Bind { addr, source } => {
                write!(f, "Failed to bind {}: {}", addr, source)
            }
            RelayError::Store(msg) => write!(f, "Record store error: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Io(e) => Some(e),
            RelayError::Bind { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for RelayError {
    fn from(err: io::Error) -> Self {
        RelayError::Io(err)
    }
}

/// Convenience type alias for Results using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;
