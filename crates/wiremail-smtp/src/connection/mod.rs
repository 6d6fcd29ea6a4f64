//! Blocking SMTP connection management.

mod log;
mod stream;
mod transport;

pub use log::{DEFAULT_LOG_SIZE, TransactionLog};
pub use stream::{Connection, TlsStream, create_tls_config};
pub use transport::{MAX_LINE_LENGTH, Transport};

use crate::types::{AuthMechanism, Extension, Reply};
use std::collections::HashSet;

/// Server capabilities from EHLO response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Builds server information from an EHLO reply.
    ///
    /// The first line names the server; each further line is one extension.
    #[must_use]
    pub fn from_ehlo(reply: &Reply) -> Self {
        let mut lines = reply.message.iter();
        let hostname = lines
            .next()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or_default()
            .to_string();
        let extensions = lines.map(|line| Extension::parse(line)).collect();

        Self {
            hostname,
            extensions,
        }
    }

    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Returns supported authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::parse_reply;

    #[test]
    fn test_from_ehlo() {
        let lines: Vec<String> = [
            "250-mx.example.com greets you",
            "250-SIZE 1000",
            "250-AUTH LOGIN PLAIN",
            "250 STARTTLS",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        let info = ServerInfo::from_ehlo(&parse_reply(&lines).unwrap());

        assert_eq!(info.hostname, "mx.example.com");
        assert!(info.supports_starttls());
        assert_eq!(info.max_message_size(), Some(1000));
        assert_eq!(
            info.auth_mechanisms(),
            vec![AuthMechanism::Login, AuthMechanism::Plain]
        );
    }

    #[test]
    fn test_from_helo_reply() {
        let lines = vec!["250 mx.example.com".to_string()];
        let info = ServerInfo::from_ehlo(&parse_reply(&lines).unwrap());
        assert_eq!(info.hostname, "mx.example.com");
        assert!(!info.supports_starttls());
        assert!(info.auth_mechanisms().is_empty());
    }
}
