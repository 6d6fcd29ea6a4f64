//! SMTP command builder.

use std::fmt;

use crate::error::{Error, Result};
use crate::types::AuthMechanism;

/// SMTP command.
///
/// Rendered without the trailing CRLF; the transport appends it.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
    },
    /// Base64 payload sent in answer to a 334 challenge
    AuthResponse(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender mailbox
        from: String,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient mailbox
        to: String,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Builds `MAIL FROM:<from>`, refusing mailboxes that could break the line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if `from` contains CR, LF, `<` or `>`.
    pub fn mail_from(from: &str) -> Result<Self> {
        check_mailbox(from)?;
        Ok(Self::MailFrom {
            from: from.to_string(),
        })
    }

    /// Builds `RCPT TO:<to>`, refusing mailboxes that could break the line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if `to` contains CR, LF, `<` or `>`.
    pub fn rcpt_to(to: &str) -> Result<Self> {
        check_mailbox(to)?;
        Ok(Self::RcptTo { to: to.to_string() })
    }

    /// Returns the command verb, as logged.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } | Self::AuthResponse(_) => "AUTH",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Quit => "QUIT",
        }
    }

    /// Returns true if the rendered line carries credentials.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::AuthResponse(_))
    }

    /// Renders the command line without CRLF.
    #[must_use]
    pub fn to_line(&self) -> String {
        match self {
            Self::Helo { hostname } => format!("HELO {hostname}"),
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::Auth { mechanism } => format!("AUTH {mechanism}"),
            Self::AuthResponse(payload) => payload.clone(),
            Self::MailFrom { from } => format!("MAIL FROM:<{from}>"),
            Self::RcptTo { to } => format!("RCPT TO:<{to}>"),
            Self::Data => "DATA".to_string(),
            Self::Rset => "RSET".to_string(),
            Self::Quit => "QUIT".to_string(),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sensitive() {
            f.write_str("AuthResponse(<redacted>)")
        } else {
            f.write_str(&self.to_line())
        }
    }
}

fn check_mailbox(mailbox: &str) -> Result<()> {
    if mailbox.contains(['\r', '\n', '<', '>']) {
        return Err(Error::precondition(format!(
            "mailbox contains a forbidden character: {mailbox:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_helo_command() {
        let cmd = Command::Helo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.to_line(), "HELO client.example.com");
    }

    #[test]
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.to_line(), "EHLO client.example.com");
    }

    #[test]
    fn test_starttls_command() {
        assert_eq!(Command::StartTls.to_line(), "STARTTLS");
    }

    #[test]
    fn test_auth_commands() {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::CramMd5,
        };
        assert_eq!(cmd.to_line(), "AUTH CRAM-MD5");

        let cmd = Command::AuthResponse("AHUAcA==".to_string());
        assert_eq!(cmd.to_line(), "AHUAcA==");
        assert!(cmd.is_sensitive());
        assert_eq!(format!("{cmd:?}"), "AuthResponse(<redacted>)");
    }

    #[test]
    fn test_mail_from() {
        let cmd = Command::mail_from("sender@example.com").unwrap();
        assert_eq!(cmd.to_line(), "MAIL FROM:<sender@example.com>");
        assert_eq!(cmd.verb(), "MAIL");
    }

    #[test]
    fn test_null_reverse_path() {
        let cmd = Command::mail_from("").unwrap();
        assert_eq!(cmd.to_line(), "MAIL FROM:<>");
    }

    #[test]
    fn test_rcpt_to() {
        let cmd = Command::rcpt_to("recipient@example.com").unwrap();
        assert_eq!(cmd.to_line(), "RCPT TO:<recipient@example.com>");
    }

    #[test]
    fn test_mailbox_injection_refused() {
        for bad in ["a@b\r\nRCPT TO:<c@d>", "a@b\n", "a>@b", "<a@b"] {
            assert!(matches!(
                Command::mail_from(bad),
                Err(Error::Precondition(_))
            ));
            assert!(matches!(Command::rcpt_to(bad), Err(Error::Precondition(_))));
        }
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::Data.to_line(), "DATA");
        assert_eq!(Command::Rset.to_line(), "RSET");
        assert_eq!(Command::Quit.to_line(), "QUIT");
        assert_eq!(format!("{:?}", Command::Quit), "QUIT");
    }
}
