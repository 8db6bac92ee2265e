//! Transport errors

use std::io;
use std::net::SocketAddr;

/// Errors raised at the transport boundary.
///
/// None of these are fatal to the process: the affected loop stops and the
/// owning object's liveness flag goes false.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection timed out")]
    ConnectionTimeout,

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("Connection closed")]
    Closed,

    #[error("Payload could not be (de)serialized: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Host assigned an invalid slot: {0}")]
    InvalidSlot(u8),

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::TimedOut => Self::ConnectionTimeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::Closed,
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_taxonomy() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(matches!(TransportError::from(refused), TransportError::ConnectionRefused));

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(matches!(TransportError::from(reset), TransportError::Closed));

        let other = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(TransportError::from(other), TransportError::Io(_)));
    }
}
