//! Server error types.

use std::net::SocketAddr;

use thiserror::Error;

/// Fatal errors from server construction.
///
/// These surface before the server is published; per-request failures are
/// converted into HTTP responses instead and never appear here.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured bind address could not be parsed.
    #[error("invalid listen address '{addr}': {source}")]
    InvalidAddr {
        /// The offending address string.
        addr: String,
        /// The parse failure.
        source: std::net::AddrParseError,
    },

    /// The listen socket could not be acquired (e.g. port already in use).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address the server tried to bind.
        addr: SocketAddr,
        /// The underlying I/O failure.
        source: std::io::Error,
    },
}
