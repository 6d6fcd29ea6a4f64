//! Session configuration types.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;

use crate::connection::DEFAULT_LOG_SIZE;
use crate::types::AuthMechanism;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 25). **Not recommended for submission.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 587).
    #[default]
    StartTls,
    /// TLS from the start (port 465).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }
}

/// Username and password for AUTH.
///
/// Never printed: `Debug` shows the username only.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Per-exchange reply deadlines (RFC 5321 §4.5.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// 220 greeting.
    pub greeting: Duration,
    /// EHLO or HELO reply.
    pub helo: Duration,
    /// STARTTLS reply.
    pub starttls: Duration,
    /// MAIL FROM reply.
    pub mail: Duration,
    /// RCPT TO reply.
    pub rcpt: Duration,
    /// 354 reply to DATA.
    pub data_init: Duration,
    /// Reply to the terminating dot.
    pub data_term: Duration,
    /// QUIT reply.
    pub quit: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            greeting: Duration::from_secs(300),
            helo: Duration::from_secs(300),
            starttls: Duration::from_secs(180),
            mail: Duration::from_secs(300),
            rcpt: Duration::from_secs(300),
            data_init: Duration::from_secs(120),
            data_term: Duration::from_secs(600),
            quit: Duration::from_secs(300),
        }
    }
}

/// SMTP session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Name announced in EHLO/HELO.
    pub helo_name: String,
    /// Credentials; AUTH is skipped by [`crate::Session::establish`] without them.
    pub credentials: Option<Credentials>,
    /// Mechanism to use instead of PLAIN.
    pub auth_mechanism: Option<AuthMechanism>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read timeout for replies without a dedicated deadline.
    pub io_timeout: Duration,
    /// Reply deadlines.
    pub timeouts: Timeouts,
    /// Number of raw lines kept in the transaction log.
    pub max_log_size: usize,
    /// TLS client configuration; webpki roots when unset.
    pub tls: Option<Arc<ClientConfig>>,
}

impl Config {
    /// Creates a new configuration with STARTTLS on port 587.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    helo_name: String,
    credentials: Option<Credentials>,
    auth_mechanism: Option<AuthMechanism>,
    connect_timeout: Duration,
    io_timeout: Duration,
    timeouts: Timeouts,
    max_log_size: usize,
    tls: Option<Arc<ClientConfig>>,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::default(),
            helo_name: "localhost".to_string(),
            credentials: None,
            auth_mechanism: None,
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(30),
            timeouts: Timeouts::default(),
            max_log_size: DEFAULT_LOG_SIZE,
            tls: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the name announced in EHLO/HELO.
    #[must_use]
    pub fn helo_name(mut self, name: impl Into<String>) -> Self {
        self.helo_name = name.into();
        self
    }

    /// Sets the credentials used by AUTH.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Forces an authentication mechanism.
    #[must_use]
    pub const fn auth_mechanism(mut self, mechanism: AuthMechanism) -> Self {
        self.auth_mechanism = Some(mechanism);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the reply deadlines.
    #[must_use]
    pub const fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets the transaction log capacity.
    #[must_use]
    pub const fn max_log_size(mut self, size: usize) -> Self {
        self.max_log_size = size;
        self
    }

    /// Uses a custom TLS client configuration.
    #[must_use]
    pub fn tls_config(mut self, tls: Arc<ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            host: self.host,
            security: self.security,
            helo_name: self.helo_name,
            credentials: self.credentials,
            auth_mechanism: self.auth_mechanism,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            timeouts: self.timeouts,
            max_log_size: self.max_log_size,
            tls: self.tls,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("smtp.example.com");
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.helo_name, "localhost");
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.io_timeout, Duration::from_secs(30));
        assert_eq!(config.max_log_size, 64);
        assert!(config.credentials.is_none());
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_default_timeouts() {
        let t = Timeouts::default();
        assert_eq!(t.greeting, Duration::from_secs(300));
        assert_eq!(t.starttls, Duration::from_secs(180));
        assert_eq!(t.data_init, Duration::from_secs(120));
        assert_eq!(t.data_term, Duration::from_secs(600));
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("smtp.example.com")
            .port(2525)
            .security(Security::None)
            .helo_name("client.example.com")
            .credentials("user", "secret")
            .auth_mechanism(AuthMechanism::Login)
            .connect_timeout(Duration::from_secs(10))
            .max_log_size(8)
            .build();

        assert_eq!(config.port, 2525);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.helo_name, "client.example.com");
        assert_eq!(config.credentials.as_ref().unwrap().username(), "user");
        assert_eq!(config.auth_mechanism, Some(AuthMechanism::Login));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_log_size, 8);
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = Config::builder("smtp.example.com")
            .security(Security::Implicit)
            .build();

        assert_eq!(config.port, 465);
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let config = Config::builder("smtp.example.com")
            .credentials("user", "hunter2")
            .build();
        let printed = format!("{config:?}");
        assert!(printed.contains("user"));
        assert!(!printed.contains("hunter2"));
    }
}
