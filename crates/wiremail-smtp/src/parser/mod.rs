//! SMTP response parser.

use std::time::Duration;

use crate::connection::Transport;
use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode, ReplyLine};

/// Parses one reply line.
///
/// The line is `NNN`, optionally followed by a separator (`-` for a
/// continuation, space for the final line) and text. A trailing CRLF or LF
/// is ignored.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the line does not start with a
/// three-digit code.
pub fn parse_reply_line(line: &str) -> Result<ReplyLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(Error::protocol(None, format!("Malformed reply line: {line}")));
    }

    let code = ReplyCode::new(
        line[..3]
            .parse()
            .map_err(|_| Error::protocol(None, format!("Invalid reply code: {line}")))?,
    );
    let (continues, text) = match bytes.get(3) {
        Some(b'-') => (true, &line[4..]),
        Some(b' ') => (false, &line[4..]),
        Some(_) => (false, &line[3..]),
        None => (false, ""),
    };

    Ok(ReplyLine {
        code,
        continues,
        text: text.to_string(),
    })
}

/// Parses an SMTP reply from response lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// The code of the final line is the reply code.
///
/// # Errors
///
/// Returns an error if the reply is empty or a line is malformed.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let mut code = None;
    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        let parsed = parse_reply_line(line)?;
        code = Some(parsed.code);
        message.push(parsed.text);
    }

    let code = code.ok_or_else(|| Error::protocol(None, "Empty reply"))?;
    let raw = lines
        .iter()
        .map(|l| l.trim_end_matches(['\r', '\n']).to_string())
        .collect();
    Ok(Reply::new(code, message, raw))
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Multi-line replies use `-` separator for continuation and ` ` for the last line.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() >= 4 && line.as_bytes()[3] == b' '
}

/// Reads one complete reply and checks its code against `accepted`.
///
/// Continuation lines are read until the final line, whose code decides the
/// outcome. Each read is bounded by `timeout`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] carrying the text of every line joined by
/// spaces if the code is not accepted or a line is malformed, and passes
/// through transport errors ([`Error::Timeout`], [`Error::Io`]).
pub fn expect(transport: &mut Transport, accepted: &[ReplyCode], timeout: Duration) -> Result<Reply> {
    let mut raw = Vec::new();
    let mut message = Vec::new();

    let code = loop {
        let line = transport.receive_line(timeout)?;
        let parsed = match parse_reply_line(&line) {
            Ok(parsed) => parsed,
            Err(_) => {
                message.push(line.trim_end().to_string());
                return Err(Error::protocol(None, message.join(" ")));
            }
        };
        raw.push(line.trim_end_matches(['\r', '\n']).to_string());
        message.push(parsed.text);
        if !parsed.continues {
            break parsed.code;
        }
    };

    tracing::debug!(code = code.as_u16(), "reply");
    if accepted.contains(&code) {
        Ok(Reply::new(code, message, raw))
    } else {
        Err(Error::protocol(Some(code.as_u16()), message.join(" ")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_line() {
        let line = parse_reply_line("250-mx.example.com\r\n").unwrap();
        assert_eq!(line.code, ReplyCode::OK);
        assert!(line.continues);
        assert_eq!(line.text, "mx.example.com");

        let line = parse_reply_line("354 Go ahead\n").unwrap();
        assert_eq!(line.code, ReplyCode::START_DATA);
        assert!(!line.continues);
        assert_eq!(line.text, "Go ahead");
    }

    #[test]
    fn test_parse_reply_line_bare_code() {
        let line = parse_reply_line("250\r\n").unwrap();
        assert_eq!(line.code, ReplyCode::OK);
        assert!(!line.continues);
        assert_eq!(line.text, "");
    }

    #[test]
    fn test_parse_reply_line_malformed() {
        assert!(parse_reply_line("").is_err());
        assert!(parse_reply_line("25").is_err());
        assert!(parse_reply_line("ABC OK").is_err());
        assert!(parse_reply_line("2é0 OK").is_err());
    }

    #[test]
    fn test_parse_single_line_reply() {
        let lines = vec!["250 OK".to_string()];
        let reply = parse_reply(&lines).unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.message, vec!["OK"]);
        assert_eq!(reply.raw, vec!["250 OK"]);
        assert!(reply.is_success());
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let lines = vec![
            "250-First line".to_string(),
            "250-Second line".to_string(),
            "250 Last line".to_string(),
        ];
        let reply = parse_reply(&lines).unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(
            reply.message,
            vec!["First line", "Second line", "Last line"]
        );
        assert_eq!(reply.last_line(), "Last line");
    }

    #[test]
    fn test_parse_greeting() {
        let lines = vec!["220 smtp.example.com ESMTP ready\r\n".to_string()];
        let reply = parse_reply(&lines).unwrap();
        assert_eq!(reply.code.as_u16(), 220);
        assert_eq!(reply.message, vec!["smtp.example.com ESMTP ready"]);
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(!is_last_reply_line("250-Continuing"));
        assert!(!is_last_reply_line("250"));
    }

    #[test]
    fn test_parse_error_empty() {
        assert!(parse_reply(&[]).is_err());
    }

    #[test]
    fn test_parse_error_invalid_code() {
        let lines = vec!["ABC OK".to_string()];
        assert!(parse_reply(&lines).is_err());
    }
}
