//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Every error is terminal for the command that raised it. I/O-level
/// failures ([`Error::is_session_fatal`]) also end the session; protocol
/// rejections leave the connection usable for `RSET` or `QUIT`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Host did not resolve or no address accepted the connection.
    #[error("Connection to {host} failed: {source}")]
    Connection {
        /// Host as configured.
        host: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// TLS handshake failed on an established socket.
    #[error("TLS handshake with {host} failed: {source}")]
    TlsHandshake {
        /// Server the handshake was attempted with.
        host: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// Read deadline exceeded.
    #[error("{host} timed out after {timeout:?}")]
    Timeout {
        /// Server that failed to answer.
        host: String,
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// I/O error on a live (or already closed) socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Server returned an unexpected or malformed reply.
    #[error("Protocol error{}: {message}", .code.map(|c| format!(" {c}")).unwrap_or_default())]
    Protocol {
        /// Reply code, if one could be parsed.
        code: Option<u16>,
        /// Text of every reply line, joined by spaces.
        message: String,
    },

    /// Credentials rejected, or a second AUTH in the same session.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Command issued out of order or with unusable arguments.
    #[error("Invalid state for operation: {0}")]
    Precondition(String),
}

impl Error {
    /// Creates a protocol error from a reply code and message.
    #[must_use]
    pub fn protocol(code: Option<u16>, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Creates a precondition error.
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Returns the server reply code carried by this error, if any.
    #[must_use]
    pub const fn reply_code(&self) -> Option<u16> {
        match self {
            Self::Protocol { code, .. } => *code,
            _ => None,
        }
    }

    /// Returns true if the connection can no longer be trusted.
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Tls(_)
                | Self::TlsHandshake { .. }
                | Self::Timeout { .. }
                | Self::Io(_)
        )
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Protocol { code: Some(code), .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Protocol { code: Some(code), .. } if *code >= 400 && *code < 500)
    }
}
