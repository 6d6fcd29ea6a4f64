//! SMTP session state machine.
//!
//! A [`Session`] owns one [`Transport`] and walks it through the RFC 5321
//! command sequence. Every command checks its precondition before touching
//! the wire, and any I/O-level failure closes the connection.

mod auth;

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;

use crate::command::Command;
use crate::config::{Config, Security};
use crate::connection::{ServerInfo, Transport, create_tls_config};
use crate::error::{Error, Result};
use crate::parser::expect;
use crate::types::{Reply, ReplyCode};

/// Longest DATA line accepted, line end excluded (RFC 5321 §4.5.3.1.6).
pub const MAX_DATA_LINE_LENGTH: usize = 998;

/// Progress of the current session and mail transaction.
///
/// `recipient_set` implies `sender_set`, which implies `hello_done`;
/// `data_sent` implies `recipient_set`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct TransactionFlags {
    /// EHLO or HELO accepted.
    pub hello_done: bool,
    /// AUTH succeeded.
    pub authenticated: bool,
    /// MAIL FROM accepted.
    pub sender_set: bool,
    /// At least one RCPT TO accepted.
    pub recipient_set: bool,
    /// Message accepted after the terminating dot.
    pub data_sent: bool,
}

impl TransactionFlags {
    /// Returns true between an accepted MAIL and the next RSET or MAIL.
    #[must_use]
    pub const fn in_transaction(self) -> bool {
        self.sender_set || self.recipient_set || self.data_sent
    }

    const fn clear_transaction(&mut self) {
        self.sender_set = false;
        self.recipient_set = false;
        self.data_sent = false;
    }
}

/// Session state, derived from the flags and the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Never connected.
    New,
    /// Connected, greeting not yet read.
    Connected,
    /// EHLO/HELO accepted.
    Greeted,
    /// Greeted over an encrypted connection.
    TlsUpgraded,
    /// AUTH succeeded.
    Authenticated,
    /// MAIL FROM accepted.
    SenderSet,
    /// RCPT TO accepted.
    RecipientSet,
    /// Message accepted.
    DataSent,
    /// Connection closed by QUIT, `close` or a fatal error.
    Closed,
}

/// Blocking SMTP client session.
///
/// # Example
///
/// ```no_run
/// use wiremail_smtp::{Config, Security, Session};
///
/// # fn main() -> wiremail_smtp::Result<()> {
/// let config = Config::builder("smtp.example.com")
///     .security(Security::StartTls)
///     .credentials("user@example.com", "password")
///     .build();
///
/// let mut session = Session::new(config);
/// session.establish()?;
/// session.send_mail(
///     "user@example.com",
///     &["friend@example.org"],
///     "Subject: Hi\r\n\r\nHello!\r\n",
/// )?;
/// session.quit()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Session {
    config: Config,
    transport: Option<Transport>,
    flags: TransactionFlags,
    tls_active: bool,
    server_info: ServerInfo,
    last_reply: Option<Reply>,
}

impl Session {
    /// Creates an unconnected session.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transport: None,
            flags: TransactionFlags::default(),
            tls_active: false,
            server_info: ServerInfo::default(),
            last_reply: None,
        }
    }

    /// Creates a session over an already connected transport.
    ///
    /// The server greeting has not been read yet; call [`Session::helo`]
    /// next.
    #[must_use]
    pub fn with_transport(config: Config, mut transport: Transport) -> Self {
        transport.set_log_capacity(config.max_log_size);
        let tls_active = transport.is_tls();
        Self {
            transport: Some(transport),
            tls_active,
            ..Self::new(config)
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the transaction flags.
    #[must_use]
    pub const fn flags(&self) -> TransactionFlags {
        self.flags
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> State {
        let Some(transport) = &self.transport else {
            return State::New;
        };
        let f = self.flags;
        if !transport.is_open() {
            State::Closed
        } else if f.data_sent {
            State::DataSent
        } else if f.recipient_set {
            State::RecipientSet
        } else if f.sender_set {
            State::SenderSet
        } else if f.authenticated {
            State::Authenticated
        } else if f.hello_done && self.tls_active {
            State::TlsUpgraded
        } else if f.hello_done {
            State::Greeted
        } else {
            State::Connected
        }
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.tls_active
    }

    /// Returns what the last EHLO reply advertised.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the last accepted reply.
    #[must_use]
    pub const fn last_reply(&self) -> Option<&Reply> {
        self.last_reply.as_ref()
    }

    /// Returns the raw lines exchanged so far, oldest first.
    ///
    /// The log survives `quit` and `close`; it is replaced on reconnect.
    #[must_use]
    pub fn log(&self) -> String {
        self.transport.as_ref().map(Transport::log).unwrap_or_default()
    }

    /// Clears the transaction log.
    pub fn reset_log(&mut self) {
        if let Some(transport) = &mut self.transport {
            transport.reset_log();
        }
    }

    /// Returns the last line sent, with its CRLF.
    #[must_use]
    pub fn last_request(&self) -> Option<&str> {
        self.transport.as_ref().and_then(Transport::last_request)
    }

    /// Opens the connection; implicit TLS handshakes here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if already connected, and
    /// [`Error::Connection`] or a TLS error if the server cannot be reached.
    pub fn connect(&mut self) -> Result<()> {
        if matches!(self.state(), State::New | State::Closed) {
            let Config {
                host,
                port,
                connect_timeout,
                ..
            } = &self.config;

            let mut transport = if self.config.security == Security::Implicit {
                Transport::open_tls(host, *port, *connect_timeout, self.tls_config())?
            } else {
                Transport::open(host, *port, *connect_timeout)?
            };
            transport.set_log_capacity(self.config.max_log_size);

            self.tls_active = transport.is_tls();
            self.transport = Some(transport);
            self.flags = TransactionFlags::default();
            self.server_info = ServerInfo::default();
            self.last_reply = None;
            Ok(())
        } else {
            Err(Error::precondition("already connected"))
        }
    }

    /// Reads the greeting and introduces the client.
    ///
    /// Tries EHLO first and falls back to HELO if the server rejects it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] unless connected and not yet greeted,
    /// and [`Error::Protocol`] if the greeting is not 220 or both EHLO and
    /// HELO are rejected.
    pub fn helo(&mut self) -> Result<()> {
        if self.state() != State::Connected {
            return Err(Error::precondition("HELO requires a fresh connection"));
        }

        let timeout = self.config.timeouts.greeting;
        let greeting = self.reply(&[ReplyCode::SERVICE_READY], timeout)?;
        tracing::info!(greeting = greeting.last_line(), "server ready");

        self.hello()
    }

    fn hello(&mut self) -> Result<()> {
        let timeout = self.config.timeouts.helo;
        let hostname = self.config.helo_name.clone();

        let ehlo = Command::Ehlo {
            hostname: hostname.clone(),
        };
        let reply = match self.command(&ehlo, &[ReplyCode::OK], timeout) {
            Ok(reply) => reply,
            Err(e @ Error::Protocol { .. }) => {
                tracing::warn!(%e, "EHLO rejected, falling back to HELO");
                self.command(&Command::Helo { hostname }, &[ReplyCode::OK], timeout)?
            }
            Err(e) => return Err(e),
        };

        self.server_info = ServerInfo::from_ehlo(&reply);
        self.flags.hello_done = true;
        Ok(())
    }

    /// Upgrades the connection with STARTTLS and introduces the client again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] unless greeted over plaintext, not
    /// authenticated, outside a mail transaction and with
    /// [`Security::StartTls`] configured, [`Error::Protocol`] if the server
    /// refuses, and a TLS error if the handshake fails. Handshake failures
    /// close the session.
    pub fn starttls(&mut self) -> Result<()> {
        if self.state() != State::Greeted {
            return Err(Error::precondition("STARTTLS requires a greeted plaintext session"));
        }
        if self.config.security != Security::StartTls {
            return Err(Error::precondition("STARTTLS is not the configured security mode"));
        }
        if !self.server_info.supports_starttls() {
            tracing::warn!(host = %self.config.host, "server did not advertise STARTTLS");
        }

        let timeout = self.config.timeouts.starttls;
        self.command(&Command::StartTls, &[ReplyCode::SERVICE_READY], timeout)?;

        let tls = self.tls_config();
        let upgraded = self.transport()?.upgrade_tls(tls);
        if let Err(e) = upgraded {
            self.abort(&e);
            return Err(e);
        }

        // Everything learned before the handshake is discarded (RFC 3207 §4.2).
        self.tls_active = true;
        self.flags = TransactionFlags::default();
        self.server_info = ServerInfo::default();
        self.hello()
    }

    /// Authenticates with the configured credentials.
    ///
    /// Uses the configured mechanism, PLAIN by default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if not greeted, inside a mail
    /// transaction or no credentials are configured, and
    /// [`Error::Authentication`] if already authenticated or the server
    /// rejects the exchange.
    pub fn auth(&mut self) -> Result<()> {
        if !self.flags.hello_done {
            return Err(Error::precondition("AUTH requires a greeted session"));
        }
        if self.flags.in_transaction() {
            return Err(Error::precondition("AUTH is not allowed during a mail transaction"));
        }
        let Some(credentials) = self.config.credentials.clone() else {
            return Err(Error::precondition("AUTH requires credentials"));
        };
        if self.flags.authenticated {
            return Err(Error::Authentication("already authenticated".into()));
        }

        let mechanism = self.config.auth_mechanism.unwrap_or_default();
        tracing::debug!(%mechanism, username = credentials.username(), "authenticating");
        self.authenticate(mechanism, &credentials)?;

        self.flags.authenticated = true;
        tracing::info!(%mechanism, "authenticated");
        Ok(())
    }

    /// Starts a mail transaction.
    ///
    /// Any recipients and message of a previous transaction are forgotten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if not greeted or `from` contains
    /// CR, LF, `<` or `>`, and [`Error::Protocol`] if the server refuses.
    pub fn mail(&mut self, from: &str) -> Result<()> {
        if !self.flags.hello_done {
            return Err(Error::precondition("MAIL requires a greeted session"));
        }
        let cmd = Command::mail_from(from)?;
        self.flags.clear_transaction();

        let timeout = self.config.timeouts.mail;
        self.command(&cmd, &[ReplyCode::OK], timeout)?;
        self.flags.sender_set = true;
        Ok(())
    }

    /// Adds a recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] before MAIL or if `to` contains CR,
    /// LF, `<` or `>`, and [`Error::Protocol`] if the server refuses.
    pub fn rcpt(&mut self, to: &str) -> Result<()> {
        if !self.flags.sender_set {
            return Err(Error::precondition("RCPT requires MAIL first"));
        }
        let cmd = Command::rcpt_to(to)?;

        let timeout = self.config.timeouts.rcpt;
        self.command(&cmd, &[ReplyCode::OK, ReplyCode::FORWARD], timeout)?;
        self.flags.recipient_set = true;
        Ok(())
    }

    /// Sends the message body.
    ///
    /// The body is taken as bytes, so 8bit content need not be UTF-8.
    /// Lines are split on LF with one trailing CR dropped; a final LF does
    /// not add an empty line. Lines starting with `.` are dot-stuffed and
    /// the terminating `.` is appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] before RCPT, after the message was
    /// already accepted, or if a line exceeds [`MAX_DATA_LINE_LENGTH`]
    /// bytes (checked before `DATA` is sent), and [`Error::Protocol`] if
    /// the server refuses. A refused message ends the transaction.
    pub fn data<B: AsRef<[u8]> + ?Sized>(&mut self, body: &B) -> Result<()> {
        if !self.flags.recipient_set {
            return Err(Error::precondition("DATA requires at least one RCPT"));
        }
        if self.flags.data_sent {
            return Err(Error::precondition("message already sent; start over with MAIL"));
        }
        let lines = stuffed_lines(body.as_ref())?;

        let timeouts = self.config.timeouts;
        self.command(&Command::Data, &[ReplyCode::START_DATA], timeouts.data_init)?;

        let sent = lines
            .iter()
            .try_for_each(|line| self.transport()?.send_line(line).map(drop));
        self.guard(sent)?;
        if let Err(e) = self.raw_command(".", &[ReplyCode::OK], timeouts.data_term) {
            // The server drops the transaction once it has answered the dot.
            self.flags.clear_transaction();
            return Err(e);
        }

        self.flags.data_sent = true;
        tracing::debug!(lines = lines.len(), "message accepted");
        Ok(())
    }

    /// Aborts the current mail transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if not greeted and
    /// [`Error::Protocol`] if the server refuses.
    pub fn rset(&mut self) -> Result<()> {
        if !self.flags.hello_done {
            return Err(Error::precondition("RSET requires a greeted session"));
        }

        let timeout = self.config.io_timeout;
        self.command(
            &Command::Rset,
            &[ReplyCode::OK, ReplyCode::SERVICE_READY],
            timeout,
        )?;
        self.flags.clear_transaction();
        Ok(())
    }

    /// Says goodbye and closes the connection.
    ///
    /// The connection is closed even if the server answers with something
    /// other than 221.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if not greeted and
    /// [`Error::Protocol`] if the server does not answer 221.
    pub fn quit(&mut self) -> Result<()> {
        if !self.flags.hello_done {
            return Err(Error::precondition("QUIT requires a greeted session"));
        }

        let timeout = self.config.timeouts.quit;
        let result = self.command(&Command::Quit, &[ReplyCode::CLOSING], timeout);
        self.close();
        tracing::info!(host = %self.config.host, "session closed");
        result.map(drop)
    }

    /// Closes the connection without QUIT. Safe to call in any state.
    pub fn close(&mut self) {
        if let Some(transport) = &mut self.transport {
            transport.close();
        }
        self.flags = TransactionFlags::default();
        self.tls_active = false;
    }

    /// Connects, greets, upgrades and authenticates as configured.
    ///
    /// STARTTLS runs when [`Security::StartTls`] is configured; AUTH runs
    /// when credentials are.
    ///
    /// # Errors
    ///
    /// Returns the first error of the sequence.
    pub fn establish(&mut self) -> Result<()> {
        self.connect()?;
        self.helo()?;
        if self.config.security == Security::StartTls {
            self.starttls()?;
        }
        if self.config.credentials.is_some() {
            self.auth()?;
        }
        Ok(())
    }

    /// Runs one complete mail transaction: MAIL, every RCPT, then DATA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if `recipients` is empty, and the
    /// first error of the sequence otherwise.
    pub fn send_mail<S, B>(&mut self, from: &str, recipients: &[S], body: &B) -> Result<()>
    where
        S: AsRef<str>,
        B: AsRef<[u8]> + ?Sized,
    {
        if recipients.is_empty() {
            return Err(Error::precondition("no recipients"));
        }

        self.mail(from)?;
        for to in recipients {
            self.rcpt(to.as_ref())?;
        }
        self.data(body)
    }

    fn tls_config(&self) -> Arc<ClientConfig> {
        self.config.tls.clone().unwrap_or_else(create_tls_config)
    }

    fn transport(&mut self) -> Result<&mut Transport> {
        self.transport
            .as_mut()
            .filter(|t| t.is_open())
            .ok_or_else(|| Error::precondition("not connected"))
    }

    /// Sends `cmd` and waits for one of `accepted`.
    fn command(&mut self, cmd: &Command, accepted: &[ReplyCode], timeout: Duration) -> Result<Reply> {
        tracing::debug!(command = cmd.verb(), "sending");
        let line = cmd.to_line();
        let transport = self.transport()?;
        let sent = if cmd.is_sensitive() {
            transport.send_secret_line(&line)
        } else {
            transport.send_line(&line)
        };
        self.guard(sent)?;
        self.reply(accepted, timeout)
    }

    fn raw_command(&mut self, line: &str, accepted: &[ReplyCode], timeout: Duration) -> Result<Reply> {
        let sent = self.transport()?.send_line(line);
        self.guard(sent)?;
        self.reply(accepted, timeout)
    }

    fn reply(&mut self, accepted: &[ReplyCode], timeout: Duration) -> Result<Reply> {
        let reply = expect(self.transport()?, accepted, timeout);
        let reply = self.guard(reply)?;
        self.last_reply = Some(reply.clone());
        Ok(reply)
    }

    /// Closes the session if `result` is an I/O-level failure.
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_session_fatal()
        {
            self.abort(e);
        }
        result
    }

    fn abort(&mut self, error: &Error) {
        tracing::debug!(%error, host = %self.config.host, "closing session after failure");
        self.close();
        self.server_info = ServerInfo::default();
    }
}

/// Splits a body into wire lines, dot-stuffed, without line ends.
fn stuffed_lines(body: &[u8]) -> Result<Vec<Cow<'_, [u8]>>> {
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let body = body.strip_suffix(b"\n").unwrap_or(body);
    body.split(|&b| b == b'\n')
        .enumerate()
        .map(|(i, line)| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.len() > MAX_DATA_LINE_LENGTH {
                return Err(Error::precondition(format!(
                    "line {} is {} bytes long, the limit is {MAX_DATA_LINE_LENGTH}",
                    i + 1,
                    line.len()
                )));
            }
            Ok(if line.starts_with(b".") {
                Cow::Owned([b".".as_slice(), line].concat())
            } else {
                Cow::Borrowed(line)
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lines(body: &[u8]) -> Vec<String> {
        stuffed_lines(body)
            .unwrap()
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    #[test]
    fn test_stuffed_lines() {
        assert!(lines(b"").is_empty());
        assert_eq!(lines(b"\n"), [""]);
        assert_eq!(lines(b"a\r\nb\n"), ["a", "b"]);
        assert_eq!(lines(b"a\n.\n..b"), ["a", "..", "...b"]);
        assert_eq!(lines(b"a\r\r\n"), ["a\r"]);
    }

    #[test]
    fn test_stuffed_lines_keep_8bit_bytes() {
        let stuffed = stuffed_lines(b"caf\xe9\r\n.\xff\r\n").unwrap();
        assert_eq!(&*stuffed[0], b"caf\xe9");
        assert_eq!(&*stuffed[1], b"..\xff");
    }

    #[test]
    fn test_line_limit() {
        let ok = "x".repeat(MAX_DATA_LINE_LENGTH);
        assert!(stuffed_lines(format!("{ok}\r\n").as_bytes()).is_ok());

        let long = format!("a\n{ok}x\n");
        let err = stuffed_lines(long.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Precondition(ref m) if m.starts_with("line 2 ")));
    }

    #[test]
    fn test_new_session_state() {
        let mut session = Session::new(Config::new("mx.test"));
        assert_eq!(session.state(), State::New);
        assert_eq!(session.flags(), TransactionFlags::default());
        assert!(session.log().is_empty());
        assert!(matches!(session.helo(), Err(Error::Precondition(_))));
        assert!(matches!(session.mail("a@b"), Err(Error::Precondition(_))));
        assert!(matches!(session.quit(), Err(Error::Precondition(_))));
        session.close();
        assert_eq!(session.state(), State::New);
    }
}
