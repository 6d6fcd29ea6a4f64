//! Low-level SMTP stream handling.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::error::{Error, Result};

/// A byte stream an SMTP session can run over.
///
/// Implemented for plain [`TcpStream`] and for [`TlsStream`]. Test doubles
/// and custom sockets implement it to drive a session without a network.
pub trait Connection: Read + Write + Send + fmt::Debug {
    /// Sets the deadline for subsequent reads. `None` blocks indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket rejects the timeout.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Performs a TLS handshake over this connection and returns the
    /// encrypted stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] or [`Error::TlsHandshake`] if the handshake
    /// fails. The plaintext connection is consumed either way.
    fn start_tls(self: Box<Self>, host: &str, tls: Arc<ClientConfig>) -> Result<Box<dyn Connection>>;

    /// Returns true once the stream is encrypted.
    fn is_tls(&self) -> bool {
        false
    }

    /// Closes the stream. Called once, from [`super::Transport::close`].
    ///
    /// # Errors
    ///
    /// Returns an error if the socket could not be shut down cleanly.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        Self::set_read_timeout(self, timeout)
    }

    fn start_tls(self: Box<Self>, host: &str, tls: Arc<ClientConfig>) -> Result<Box<dyn Connection>> {
        Ok(Box::new(TlsStream::handshake(*self, host, tls)?))
    }

    fn shutdown(&mut self) -> io::Result<()> {
        Self::shutdown(self, Shutdown::Both)
    }
}

/// TLS-encrypted TCP stream.
pub struct TlsStream(StreamOwned<ClientConnection, TcpStream>);

impl TlsStream {
    /// Runs a client handshake with `host` over `sock` to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not a valid server name or the
    /// handshake fails.
    pub fn handshake(mut sock: TcpStream, host: &str, tls: Arc<ClientConfig>) -> Result<Self> {
        let name = ServerName::try_from(host.to_string()).map_err(|e| Error::TlsHandshake {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, e),
        })?;
        let mut conn = ClientConnection::new(tls, name)?;

        while conn.is_handshaking() {
            conn.complete_io(&mut sock).map_err(|source| Error::TlsHandshake {
                host: host.to_string(),
                source,
            })?;
        }

        tracing::info!(host, version = ?conn.protocol_version(), "TLS established");
        Ok(Self(StreamOwned::new(conn, sock)))
    }
}

impl fmt::Debug for TlsStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsStream")
            .field("peer", &self.0.sock.peer_addr().ok())
            .field("version", &self.0.conn.protocol_version())
            .finish()
    }
}

impl Read for TlsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for TlsStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Connection for TlsStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.0.sock.set_read_timeout(timeout)
    }

    fn start_tls(self: Box<Self>, host: &str, _tls: Arc<ClientConfig>) -> Result<Box<dyn Connection>> {
        Err(Error::precondition(format!("connection to {host} already uses TLS")))
    }

    fn is_tls(&self) -> bool {
        true
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.0.conn.send_close_notify();
        while self.0.conn.wants_write() {
            self.0.conn.write_tls(&mut self.0.sock)?;
        }
        self.0.sock.shutdown(Shutdown::Both)
    }
}

/// Creates a TLS client configuration trusting the webpki root certificates.
#[must_use]
pub fn create_tls_config() -> Arc<ClientConfig> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_config_builds() {
        let config = create_tls_config();
        assert!(config.alpn_protocols.is_empty());
        assert!(!webpki_roots::TLS_SERVER_ROOTS.is_empty());
    }
}
