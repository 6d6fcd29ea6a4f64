//! RFC 2047 encoded words for header values.
//!
//! Format: `=?charset?encoding?encoded-text?=`, where encoding is `Q`
//! (a Quoted-Printable variant) or `B` (Base64).

use crate::encoding::{LineEnd, QpToken, decode_base64, decode_quoted_printable, encode_base64, qp_tokens};
use crate::error::{Error, Result};

/// Charset reported by [`detect_charset`] when no encoded word is present.
pub const DEFAULT_CHARSET: &str = "ASCII";

/// Encodes a header value as one or more `Q` encoded words.
///
/// Besides the body escapes, `?`, space and `_` are escaped so the text
/// survives inside an encoded word. Long values are split into several
/// words, joined by `line_end` and a single space (header folding), so that
/// each word including its delimiters fits in `line_length`. Splits happen
/// only after an encoded space; a single word longer than the limit is kept
/// whole.
#[must_use]
pub fn encode_quoted_printable_header(
    text: &[u8],
    charset: &str,
    line_length: usize,
    line_end: LineEnd,
) -> String {
    let prefix = format!("=?{charset}?Q?");
    // Suffix "?=" plus the folding space.
    let max = line_length.saturating_sub(prefix.len() + 3);

    let mut words = Vec::new();
    let mut word = String::new();
    for token in qp_tokens(text, b"? _") {
        token.push_to(&mut word);
        if token == QpToken::Escaped(b' ') {
            words.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        words.push(word);
    }

    let mut lines = Vec::new();
    let mut line = String::new();
    for word in words {
        if !line.is_empty() && line.len() + word.len() > max {
            lines.push(std::mem::take(&mut line));
        }
        line.push_str(&word);
    }
    lines.push(line);

    join_words(&prefix, &lines, line_end)
}

/// Encodes a header value as one or more `B` encoded words.
///
/// The Base64 text is folded so that each word including its delimiters
/// fits in `line_length`; words are joined by `line_end` and a single space.
#[must_use]
pub fn encode_base64_header(
    text: &[u8],
    charset: &str,
    line_length: usize,
    line_end: LineEnd,
) -> String {
    let prefix = format!("=?{charset}?B?");
    let remaining = line_length.saturating_sub(prefix.len() + 2);
    let encoded = encode_base64(text, remaining, line_end);
    let lines: Vec<&str> = encoded.split(line_end.as_str()).collect();

    join_words(&prefix, &lines, line_end)
}

fn join_words<S: AsRef<str>>(prefix: &str, lines: &[S], line_end: LineEnd) -> String {
    let separator = format!("{line_end} ");
    lines
        .iter()
        .map(|line| format!("{prefix}{}?=", line.as_ref()))
        .collect::<Vec<_>>()
        .join(&separator)
}

/// Returns the upper-cased charset of the first encoded word in `text`.
///
/// Falls back to [`DEFAULT_CHARSET`] when `text` holds no encoded word.
#[must_use]
pub fn detect_charset(text: &str) -> String {
    (0..text.len())
        .find_map(|i| EncodedWord::parse_at(text, i))
        .map_or_else(
            || DEFAULT_CHARSET.to_string(),
            |word| word.charset.to_uppercase(),
        )
}

/// Decodes every encoded word in a header value.
///
/// Whitespace between two adjacent encoded words is dropped (RFC 2047
/// §6.2); other text is kept as is. Decoded bytes are read as UTF-8.
///
/// # Errors
///
/// Returns an error if an encoded word uses an unknown encoding or carries
/// invalid encoded text, or if the result is not UTF-8.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    let mut after_word = false;

    while let Some((start, word)) = (0..rest.len())
        .find_map(|i| EncodedWord::parse_at(rest, i).filter(|w| w.closed).map(|w| (i, w)))
    {
        let between = &rest[..start];
        if !(after_word && between.trim().is_empty()) {
            out.extend_from_slice(between.as_bytes());
        }
        out.extend(word.decode()?);
        rest = &rest[start + word.len..];
        after_word = true;
    }
    out.extend_from_slice(rest.as_bytes());

    String::from_utf8(out).map_err(Into::into)
}

/// An encoded word located inside a header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EncodedWord<'a> {
    charset: &'a str,
    encoding: &'a str,
    text: &'a str,
    /// Whether the word ends with `?=`.
    closed: bool,
    /// Bytes consumed from the start of the word.
    len: usize,
}

impl<'a> EncodedWord<'a> {
    /// Parses an encoded word starting exactly at byte `at`.
    fn parse_at(s: &'a str, at: usize) -> Option<Self> {
        let rest = s.get(at..)?.strip_prefix("=?")?;
        let (charset, rest) = split_run(rest, is_token_char)?;
        let rest = rest.strip_prefix('?')?;
        let (encoding, rest) = split_run(rest, is_token_char)?;
        let rest = rest.strip_prefix('?')?;
        // Empty text only counts when the word is properly closed.
        let (text, rest) = split_run(rest, is_text_char)
            .or_else(|| rest.starts_with("?=").then_some(("", rest)))?;
        let closed = rest.starts_with("?=");

        let len = 2 + charset.len() + 1 + encoding.len() + 1 + text.len() + if closed { 2 } else { 0 };
        Some(Self {
            charset,
            encoding,
            text,
            closed,
            len,
        })
    }

    fn decode(&self) -> Result<Vec<u8>> {
        match self.encoding.to_uppercase().as_str() {
            "B" => decode_base64(self.text),
            "Q" => decode_quoted_printable(&self.text.replace('_', " ")),
            other => Err(Error::InvalidEncoding(format!("Unknown encoding: {other}"))),
        }
    }
}

/// Splits off the longest non-empty prefix whose bytes satisfy `pred`.
fn split_run(s: &str, pred: fn(u8) -> bool) -> Option<(&str, &str)> {
    let end = s.bytes().position(|b| !pred(b)).unwrap_or(s.len());
    (end > 0).then(|| s.split_at(end))
}

/// Charset and encoding names: letters, digits and `!#$%&*+-^_`{|}~`.
const fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'*' | b'+' | b'-' | b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~'
        )
}

/// Encoded text: any printable ASCII except `?`.
const fn is_text_char(b: u8) -> bool {
    matches!(b, 0x21..=0x3E | 0x40..=0x7E)
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
    use crate::encoding::LINE_LENGTH;

    #[test]
    fn test_q_header_simple() {
        let encoded =
            encode_quoted_printable_header("Héllo World".as_bytes(), "UTF-8", LINE_LENGTH, LineEnd::Lf);
        assert_eq!(encoded, "=?UTF-8?Q?H=C3=A9llo=20World?=");
    }

    #[test]
    fn test_q_header_escapes_specials() {
        let encoded = encode_quoted_printable_header(b"a?b_c=d", "UTF-8", LINE_LENGTH, LineEnd::Lf);
        assert_eq!(encoded, "=?UTF-8?Q?a=3Fb=5Fc=3Dd?=");
    }

    #[test]
    fn test_q_header_empty() {
        let encoded = encode_quoted_printable_header(b"", "UTF-8", LINE_LENGTH, LineEnd::Lf);
        assert_eq!(encoded, "=?UTF-8?Q??=");
    }

    #[test]
    fn test_q_header_splits_at_spaces() {
        let text = "word ".repeat(20);
        let encoded =
            encode_quoted_printable_header(text.as_bytes(), "UTF-8", 40, LineEnd::CrLf);
        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);
        for word in &words {
            assert!(word.starts_with("=?UTF-8?Q?"));
            assert!(word.ends_with("?="));
            assert!(word.len() < 40, "{word}");
        }
        // Every word but the last ends on an encoded space.
        for word in &words[..words.len() - 1] {
            assert!(word.ends_with("=20?="), "{word}");
        }
        assert_eq!(decode_rfc2047(&encoded).unwrap(), text.trim_end());
    }

    #[test]
    fn test_q_header_long_word_kept_whole() {
        let text = "x".repeat(100);
        let encoded = encode_quoted_printable_header(text.as_bytes(), "UTF-8", 40, LineEnd::Lf);
        assert_eq!(encoded, format!("=?UTF-8?Q?{text}?="));
    }

    #[test]
    fn test_b_header_simple() {
        let encoded = encode_base64_header("Héllo".as_bytes(), "UTF-8", LINE_LENGTH, LineEnd::Lf);
        assert_eq!(encoded, "=?UTF-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_b_header_folds() {
        let text = "é".repeat(60);
        let encoded = encode_base64_header(text.as_bytes(), "UTF-8", 40, LineEnd::CrLf);
        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);
        for word in &words {
            assert!(word.starts_with("=?UTF-8?B?") && word.ends_with("?="));
            assert!(word.len() <= 40, "{word}");
        }
        assert_eq!(decode_rfc2047(&encoded).unwrap(), text);
    }

    #[test]
    fn test_detect_charset() {
        assert_eq!(detect_charset("=?utf-8?B?SMOpbGxv?="), "UTF-8");
        assert_eq!(detect_charset("Subject: =?iso-8859-1?q?caf=E9?= ok"), "ISO-8859-1");
        assert_eq!(detect_charset("plain text"), "ASCII");
        assert_eq!(detect_charset("=?broken"), "ASCII");
        assert_eq!(detect_charset("=??Q?x?="), "ASCII");
        assert_eq!(detect_charset(""), "ASCII");
    }

    #[test]
    fn test_detect_charset_first_word_wins() {
        assert_eq!(detect_charset("=?koi8-r?B?8NLJ?= =?utf-8?B?SMOp?="), "KOI8-R");
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
    }

    #[test]
    fn test_rfc2047_quoted_printable() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_there?=").unwrap(), "Héllo there");
    }

    #[test]
    fn test_rfc2047_mixed_text() {
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?Q?caf=C3=A9?= =?utf-8?Q?_time?= now").unwrap(),
            "Re: café time now"
        );
    }

    #[test]
    fn test_rfc2047_empty_word() {
        assert_eq!(decode_rfc2047("=?UTF-8?Q??=").unwrap(), "");
        assert_eq!(decode_rfc2047("a =?UTF-8?B??= b").unwrap(), "a  b");
    }

    #[test]
    fn test_rfc2047_unknown_encoding() {
        assert!(decode_rfc2047("=?utf-8?X?abc?=").is_err());
    }
}
