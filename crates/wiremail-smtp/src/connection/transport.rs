//! Line-oriented transport over a [`Connection`].

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;

use super::log::TransactionLog;
use super::stream::{Connection, TlsStream};
use crate::error::{Error, Result};

/// Longest reply line read in one go, terminator included.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Placeholder logged in place of credential lines.
const REDACTED: &str = "<redacted>";

/// Owns one connection and moves CRLF-terminated lines over it.
///
/// The transport knows nothing about SMTP beyond line framing. Every line
/// sent or received is recorded in a bounded [`TransactionLog`].
#[derive(Debug)]
pub struct Transport {
    host: String,
    stream: Option<BufReader<Box<dyn Connection>>>,
    log: TransactionLog,
    last_request: Option<String>,
}

impl Transport {
    /// Connects to `host:port` over plain TCP.
    ///
    /// Every resolved address is tried in order; a zero `timeout` waits as
    /// long as the OS allows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if `host` does not resolve or no
    /// address accepts the connection. The last failure is reported.
    pub fn open(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let sock = connect_tcp(host, port, timeout)?;
        tracing::info!(host, port, "connected");
        Ok(Self::from_connection(host, Box::new(sock)))
    }

    /// Connects to `host:port` and performs the TLS handshake immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] as [`Transport::open`] does, or a TLS
    /// error if the handshake fails.
    pub fn open_tls(host: &str, port: u16, timeout: Duration, tls: Arc<ClientConfig>) -> Result<Self> {
        let sock = connect_tcp(host, port, timeout)?;
        if !timeout.is_zero() {
            sock.set_read_timeout(Some(timeout))?;
        }
        tracing::info!(host, port, "connected");
        let stream = TlsStream::handshake(sock, host, tls)?;
        Ok(Self::from_connection(host, Box::new(stream)))
    }

    /// Wraps an already established connection.
    #[must_use]
    pub fn from_connection(host: &str, conn: Box<dyn Connection>) -> Self {
        Self {
            host: host.to_string(),
            stream: Some(BufReader::new(conn)),
            log: TransactionLog::default(),
            last_request: None,
        }
    }

    /// Returns the host this transport talks to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns true until [`Transport::close`] is called or a TLS upgrade fails.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.get_ref().is_tls())
    }

    /// Upgrades the connection to TLS in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if the connection is already
    /// encrypted or unread plaintext is still buffered, and a TLS error if
    /// the handshake fails. A failed handshake closes the transport.
    pub fn upgrade_tls(&mut self, tls: Arc<ClientConfig>) -> Result<()> {
        let stream = self.stream.as_ref().ok_or_else(not_connected)?;
        if stream.get_ref().is_tls() {
            return Err(Error::precondition("connection already uses TLS"));
        }
        if !stream.buffer().is_empty() {
            return Err(Error::precondition(
                "unread data received before the TLS handshake",
            ));
        }

        let conn = self.stream.take().ok_or_else(not_connected)?.into_inner();
        let conn = conn.start_tls(&self.host, tls)?;
        self.stream = Some(BufReader::new(conn));
        Ok(())
    }

    /// Writes `line` followed by CRLF and returns the number of bytes written.
    ///
    /// The line is written as raw bytes; the log keeps a lossy UTF-8 copy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the transport is closed or the write fails.
    pub fn send_line<L: AsRef<[u8]> + ?Sized>(&mut self, line: &L) -> Result<usize> {
        let line = line.as_ref();
        let written = self.write_line(line)?;
        let text = String::from_utf8_lossy(line);
        tracing::trace!(line = %text, "C:");
        self.record_request(format!("{text}\r\n"));
        Ok(written)
    }

    /// Like [`Transport::send_line`], but keeps `line` out of the log and
    /// of tracing output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the transport is closed or the write fails.
    pub fn send_secret_line(&mut self, line: &str) -> Result<usize> {
        let written = self.write_line(line.as_bytes())?;
        tracing::trace!(line = REDACTED, "C:");
        self.record_request(format!("{REDACTED}\r\n"));
        Ok(written)
    }

    fn write_line(&mut self, line: &[u8]) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?.get_mut();
        let mut buf = Vec::with_capacity(line.len() + 2);
        buf.extend_from_slice(line);
        buf.extend_from_slice(b"\r\n");
        stream.write_all(&buf)?;
        stream.flush()?;
        Ok(buf.len())
    }

    fn record_request(&mut self, entry: String) {
        self.log.push(entry.clone());
        self.last_request = Some(entry);
    }

    /// Reads one line of at most [`MAX_LINE_LENGTH`] bytes, terminator
    /// included.
    ///
    /// The remainder of a longer line is read and discarded, so the next
    /// call starts on a fresh line. A zero `timeout` blocks indefinitely.
    /// Invalid UTF-8 is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if nothing arrives in time and
    /// [`Error::Io`] on any other failure, including end of stream.
    pub fn receive_line(&mut self, timeout: Duration) -> Result<String> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        stream
            .get_ref()
            .set_read_timeout((!timeout.is_zero()).then_some(timeout))?;

        let mut buf = Vec::new();
        let limit = MAX_LINE_LENGTH as u64;
        let read = stream.by_ref().take(limit).read_until(b'\n', &mut buf);
        match read {
            Ok(0) => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }
            Ok(n) if n == MAX_LINE_LENGTH && !buf.ends_with(b"\n") => {
                let skipped = stream
                    .skip_until(b'\n')
                    .map_err(|e| read_error(&self.host, e, timeout))?;
                tracing::warn!(host = %self.host, skipped, "reply line truncated");
            }
            Ok(_) => {}
            Err(e) => return Err(read_error(&self.host, e, timeout)),
        }

        let line = String::from_utf8_lossy(&buf).into_owned();
        tracing::trace!(line = line.trim_end(), "S:");
        self.log.push(line.clone());
        Ok(line)
    }

    /// Closes the connection. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let mut conn = stream.into_inner();
            if let Err(e) = conn.shutdown() {
                tracing::debug!(?e, host = %self.host, "shutdown failed");
            }
            tracing::debug!(host = %self.host, "connection closed");
        }
    }

    /// Returns the log entries concatenated, oldest first.
    #[must_use]
    pub fn log(&self) -> String {
        self.log.concat()
    }

    /// Iterates over the log entries, oldest first.
    pub fn log_entries(&self) -> impl Iterator<Item = &str> {
        self.log.entries()
    }

    /// Clears the log.
    pub fn reset_log(&mut self) {
        self.log.clear();
    }

    /// Changes how many log entries are retained.
    pub fn set_log_capacity(&mut self, capacity: usize) {
        self.log.set_capacity(capacity);
    }

    /// Returns the last line sent, with its CRLF.
    #[must_use]
    pub fn last_request(&self) -> Option<&str> {
        self.last_request.as_deref()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_error(host: &str, e: io::Error, timeout: Duration) -> Error {
    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) {
        Error::Timeout {
            host: host.to_string(),
            timeout,
        }
    } else {
        e.into()
    }
}

fn not_connected() -> Error {
    Error::Io(io::Error::new(io::ErrorKind::NotConnected, "transport is closed"))
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let connection_error = |source| Error::Connection {
        host: host.to_string(),
        source,
    };

    let addrs = (host, port).to_socket_addrs().map_err(connection_error)?;
    let mut last_error = None;
    for addr in addrs {
        let attempt = if timeout.is_zero() {
            TcpStream::connect(addr)
        } else {
            TcpStream::connect_timeout(&addr, timeout)
        };
        match attempt {
            Ok(sock) => return Ok(sock),
            Err(e) => {
                tracing::debug!(%addr, ?e, "connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(connection_error(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Scripted {
        input: Cursor<Vec<u8>>,
        sent: Arc<Mutex<Vec<u8>>>,
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Connection for Scripted {
        fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn start_tls(self: Box<Self>, _host: &str, _tls: Arc<ClientConfig>) -> Result<Box<dyn Connection>> {
            Ok(self)
        }

        fn shutdown(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn transport(input: &str) -> (Transport, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let conn = Scripted {
            input: Cursor::new(input.as_bytes().to_vec()),
            sent: Arc::clone(&sent),
        };
        (Transport::from_connection("mx.test", Box::new(conn)), sent)
    }

    #[test]
    fn test_send_line_appends_crlf() {
        let (mut t, sent) = transport("");
        assert_eq!(t.send_line("EHLO a").unwrap(), 8);
        assert_eq!(sent.lock().unwrap().as_slice(), b"EHLO a\r\n");
        assert_eq!(t.last_request(), Some("EHLO a\r\n"));
        assert_eq!(t.log(), "EHLO a\r\n");
    }

    #[test]
    fn test_secret_line_is_redacted() {
        let (mut t, sent) = transport("");
        t.send_secret_line("AHUAcA==").unwrap();
        assert_eq!(sent.lock().unwrap().as_slice(), b"AHUAcA==\r\n");
        assert_eq!(t.log(), "<redacted>\r\n");
        assert_eq!(t.last_request(), Some("<redacted>\r\n"));
    }

    #[test]
    fn test_receive_lines() {
        let (mut t, _) = transport("250-a\r\n250 b\r\n");
        assert_eq!(t.receive_line(Duration::from_secs(1)).unwrap(), "250-a\r\n");
        assert_eq!(t.receive_line(Duration::ZERO).unwrap(), "250 b\r\n");
        assert!(matches!(t.receive_line(Duration::ZERO), Err(Error::Io(_))));
        assert_eq!(t.log(), "250-a\r\n250 b\r\n");
    }

    #[test]
    fn test_receive_line_is_bounded() {
        let long = format!("250 {}\r\n250 next\r\n", "x".repeat(2000));
        let (mut t, _) = transport(&long);
        let first = t.receive_line(Duration::ZERO).unwrap();
        assert_eq!(first.len(), MAX_LINE_LENGTH);
        assert!(!first.ends_with('\n'));
        assert_eq!(t.receive_line(Duration::ZERO).unwrap(), "250 next\r\n");
    }

    #[test]
    fn test_line_of_exactly_max_length() {
        let exact = format!("250 {}\r\n", "x".repeat(MAX_LINE_LENGTH - 6));
        let (mut t, _) = transport(&format!("{exact}221 bye\r\n"));
        assert_eq!(t.receive_line(Duration::ZERO).unwrap(), exact);
        assert_eq!(t.receive_line(Duration::ZERO).unwrap(), "221 bye\r\n");
    }

    #[test]
    fn test_send_line_writes_raw_bytes() {
        let (mut t, sent) = transport("");
        t.send_line(b"caf\xe9".as_slice()).unwrap();
        assert_eq!(sent.lock().unwrap().as_slice(), b"caf\xe9\r\n");
        assert_eq!(t.last_request(), Some("caf\u{fffd}\r\n"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut t, _) = transport("");
        assert!(t.is_open());
        t.close();
        t.close();
        assert!(!t.is_open());
        assert!(matches!(t.send_line("QUIT"), Err(Error::Io(_))));
        assert!(matches!(t.receive_line(Duration::ZERO), Err(Error::Io(_))));
    }

    #[test]
    fn test_upgrade_refused_with_buffered_data() {
        let (mut t, _) = transport("220 go ahead\r\n250 injected\r\n");
        t.receive_line(Duration::ZERO).unwrap();
        let err = t.upgrade_tls(crate::connection::create_tls_config()).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert!(t.is_open());
    }

    #[test]
    fn test_log_capacity() {
        let (mut t, _) = transport("");
        t.set_log_capacity(1);
        t.send_line("RSET").unwrap();
        t.send_line("QUIT").unwrap();
        assert_eq!(t.log_entries().collect::<Vec<_>>(), ["QUIT\r\n"]);
        t.reset_log();
        assert_eq!(t.log(), "");
    }
}
