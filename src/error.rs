//! Error types for the CubeSQL client.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for CubeSQL operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for CubeSQL client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during network communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Caller-side precondition failure (empty host, bad encryption mode, ...).
    #[error("Invalid parameter: {message}")]
    Parameter { message: String },

    /// Connection timed out during TCP connect.
    #[error("Connection to {host}:{port} timed out after {timeout:?}")]
    ConnectionTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// DNS resolution failed.
    #[error("Failed to resolve hostname '{hostname}': {message}")]
    DnsResolutionFailed { hostname: String, message: String },

    /// A read or write did not complete within the connection timeout.
    #[error("Socket operation timed out after {timeout:?}")]
    SocketTimeout { timeout: Duration },

    /// The peer closed the connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The operation was interrupted by a cancel handle.
    #[error("Operation cancelled")]
    Cancelled,

    /// A reply did not start with the protocol magic.
    #[error("Wrong signature in reply header")]
    WrongSignature,

    /// A reply header failed a structural check.
    #[error("Wrong reply header: {message}")]
    WrongHeader { message: String },

    /// Authentication handshake failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Error reported by the server (`errorCode != 0` in a reply).
    #[error("Server error {code}: {message}")]
    Server { code: u16, message: String },

    /// TLS configuration or handshake failure.
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// zlib inflate failure on a compressed reply.
    #[error("Decompression error: {message}")]
    Decompress { message: String },
}

impl Error {
    /// Create a parameter error.
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter {
            message: message.into(),
        }
    }

    /// Create a header-validation error.
    pub fn wrong_header(message: impl Into<String>) -> Self {
        Self::WrongHeader {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    /// Stable numeric code for this error, mirroring the C SDK convention of
    /// negative client-side codes and positive server-side codes.
    pub fn code(&self) -> i32 {
        match self {
            Self::Server { code, .. } => *code as i32,
            Self::Parameter { .. } => -3,
            Self::Io(_) | Self::ConnectionClosed | Self::Cancelled => -4,
            Self::SocketTimeout { .. } | Self::ConnectionTimeout { .. } => -5,
            Self::DnsResolutionFailed { .. } => -6,
            Self::WrongSignature => -7,
            Self::WrongHeader { .. } => -8,
            Self::AuthenticationFailed { .. } => -9,
            Self::Tls(_) => -10,
            Self::Decompress { .. } => -11,
        }
    }
}
