//! SASL exchanges for AUTH PLAIN, LOGIN and CRAM-MD5 (RFC 4954).

use std::fmt::Write;

use hmac::{Hmac, Mac};
use md5::Md5;
use wiremail_mime::encoding::{decode_base64, encode_base64_line};

use super::Session;
use crate::command::Command;
use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::types::{AuthMechanism, Reply, ReplyCode};

impl Session {
    pub(super) fn authenticate(&mut self, mechanism: AuthMechanism, credentials: &Credentials) -> Result<()> {
        let (username, password) = (credentials.username(), credentials.password());

        self.auth_step(&Command::Auth { mechanism }, ReplyCode::AUTH_CONTINUE)?;
        match mechanism {
            AuthMechanism::Plain => {
                self.auth_respond(&plain_response(username, password), ReplyCode::AUTH_SUCCESS)?;
            }
            AuthMechanism::Login => {
                self.auth_respond(&encode_base64_line(username.as_bytes()), ReplyCode::AUTH_CONTINUE)?;
                self.auth_respond(&encode_base64_line(password.as_bytes()), ReplyCode::AUTH_SUCCESS)?;
            }
            AuthMechanism::CramMd5 => {
                let challenge = self
                    .last_reply
                    .as_ref()
                    .map(|reply| decode_base64(reply.last_line()));
                let Some(Ok(challenge)) = challenge else {
                    self.cancel_auth();
                    return Err(Error::Authentication("malformed CRAM-MD5 challenge".into()));
                };
                let response = cram_md5_response(username, password, &challenge)?;
                self.auth_respond(&response, ReplyCode::AUTH_SUCCESS)?;
            }
        }
        Ok(())
    }

    fn auth_respond(&mut self, payload: &str, expected: ReplyCode) -> Result<Reply> {
        self.auth_step(&Command::AuthResponse(payload.to_string()), expected)
    }

    fn auth_step(&mut self, cmd: &Command, expected: ReplyCode) -> Result<Reply> {
        let timeout = self.config.io_timeout;
        self.command(cmd, &[expected], timeout).map_err(|e| match e {
            Error::Protocol { code, message } => Error::Authentication(match code {
                Some(code) => format!("{code} {message}"),
                None => message,
            }),
            other => other,
        })
    }

    /// Aborts a pending exchange with `*` (RFC 4954 §4).
    fn cancel_auth(&mut self) {
        let timeout = self.config.io_timeout;
        let cancel = Command::AuthResponse("*".to_string());
        if let Err(e) = self.command(&cancel, &[ReplyCode::PARAMETER_ERROR], timeout) {
            tracing::debug!(%e, "AUTH cancellation not acknowledged");
        }
    }
}

/// `base64("\0user\0pass")`.
fn plain_response(username: &str, password: &str) -> String {
    encode_base64_line(format!("\0{username}\0{password}").as_bytes())
}

/// `base64("user " + hex(HMAC-MD5(password, challenge)))`.
fn cram_md5_response(username: &str, password: &str, challenge: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Md5>::new_from_slice(password.as_bytes())
        .map_err(|e| Error::Authentication(format!("CRAM-MD5 key rejected: {e}")))?;
    mac.update(challenge);

    let mut response = format!("{username} ");
    for byte in mac.finalize().into_bytes() {
        let _ = write!(response, "{byte:02x}");
    }
    Ok(encode_base64_line(response.as_bytes()))
}
