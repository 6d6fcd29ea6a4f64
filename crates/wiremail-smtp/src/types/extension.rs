//! SMTP extension types.

/// Extensions advertised in an EHLO reply.
///
/// Only STARTTLS and AUTH change what the client does; the rest are kept
/// for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// AUTH - Authentication
    Auth(Vec<AuthMechanism>),
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// Any other keyword, as received
    Unknown(String),
}

impl Extension {
    /// Parses an extension line from EHLO response.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            return Self::Unknown(line.to_string());
        }

        let keyword = parts[0].to_uppercase();
        match keyword.as_str() {
            "STARTTLS" => Self::StartTls,
            // Some older servers announce "AUTH=LOGIN PLAIN".
            "AUTH" | "AUTH=" => Self::Auth(parse_mechanisms(&parts[1..])),
            k if k.starts_with("AUTH=") => {
                let mut words = vec![&parts[0][5..]];
                words.extend_from_slice(&parts[1..]);
                Self::Auth(parse_mechanisms(&words))
            }
            "SIZE" => {
                let size = parts.get(1).and_then(|s| s.parse().ok());
                Self::Size(size)
            }
            _ => Self::Unknown(line.to_string()),
        }
    }
}

fn parse_mechanisms(words: &[&str]) -> Vec<AuthMechanism> {
    words.iter().filter_map(|m| AuthMechanism::parse(m)).collect()
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthMechanism {
    /// PLAIN - plaintext authentication
    #[default]
    Plain,
    /// LOGIN - legacy plaintext
    Login,
    /// CRAM-MD5 - challenge-response
    CramMd5,
}

impl AuthMechanism {
    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            _ => None,
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
        }
    }
}

impl std::fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod extension_parse_tests {
        use super::*;

        #[test]
        fn parse_starttls() {
            assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
            assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        }

        #[test]
        fn parse_auth() {
            let ext = Extension::parse("AUTH PLAIN LOGIN CRAM-MD5 XOAUTH2");
            assert_eq!(
                ext,
                Extension::Auth(vec![
                    AuthMechanism::Plain,
                    AuthMechanism::Login,
                    AuthMechanism::CramMd5
                ])
            );
        }

        #[test]
        fn parse_legacy_auth() {
            let ext = Extension::parse("AUTH=LOGIN PLAIN");
            assert_eq!(
                ext,
                Extension::Auth(vec![AuthMechanism::Login, AuthMechanism::Plain])
            );
        }

        #[test]
        fn parse_size() {
            assert_eq!(Extension::parse("SIZE 52428800"), Extension::Size(Some(52_428_800)));
            assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
        }

        #[test]
        fn parse_unknown() {
            assert_eq!(
                Extension::parse("PIPELINING"),
                Extension::Unknown("PIPELINING".to_string())
            );
            assert!(matches!(Extension::parse(""), Extension::Unknown(_)));
        }
    }

    mod auth_mechanism_tests {
        use super::*;

        #[test]
        fn parse() {
            assert_eq!(AuthMechanism::parse("plain"), Some(AuthMechanism::Plain));
            assert_eq!(AuthMechanism::parse("LOGIN"), Some(AuthMechanism::Login));
            assert_eq!(AuthMechanism::parse("cram-md5"), Some(AuthMechanism::CramMd5));
            assert_eq!(AuthMechanism::parse("XOAUTH2"), None);
        }

        #[test]
        fn as_str() {
            assert_eq!(AuthMechanism::Plain.as_str(), "PLAIN");
            assert_eq!(AuthMechanism::Login.as_str(), "LOGIN");
            assert_eq!(AuthMechanism::CramMd5.to_string(), "CRAM-MD5");
        }
    }
}
