//! Body transfer encodings.
//!
//! Quoted-Printable (RFC 2045 §6.7) and Base64 (RFC 2045 §6.8), both folded
//! to a caller-chosen line length and line terminator.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

/// Default folding width for encoded lines.
pub const LINE_LENGTH: usize = 72;

/// Line terminator used when folding encoded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineEnd {
    /// Bare `\n`.
    #[default]
    Lf,
    /// `\r\n`, as transmitted on the SMTP wire.
    CrLf,
}

impl LineEnd {
    /// Returns the terminator characters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

impl fmt::Display for LineEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content-Transfer-Encoding of a MIME part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit data, lines still bounded.
    EightBit,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Base64 encoding.
    Base64,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    /// Returns the header value for this encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of an encoder: the encoded bytes and the terminator they were
/// folded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    /// Encoded bytes.
    pub bytes: Vec<u8>,
    /// Terminator used between folded lines.
    pub line_end: LineEnd,
}

impl EncodedChunk {
    /// Returns the encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the chunk, returning the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the folded lines without their terminators.
    pub fn lines(&self) -> impl Iterator<Item = &[u8]> {
        let sep = self.line_end.as_str().as_bytes();
        SplitSeparator {
            rest: Some(&self.bytes),
            sep,
        }
    }
}

struct SplitSeparator<'a> {
    rest: Option<&'a [u8]>,
    sep: &'a [u8],
}

impl<'a> Iterator for SplitSeparator<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        match rest.windows(self.sep.len()).position(|w| w == self.sep) {
            Some(pos) => {
                self.rest = Some(&rest[pos + self.sep.len()..]);
                Some(&rest[..pos])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

/// Encodes `data` with the given transfer encoding at [`LINE_LENGTH`].
///
/// 7bit and 8bit data pass through untouched.
#[must_use]
pub fn encode(data: &[u8], encoding: TransferEncoding, line_end: LineEnd) -> EncodedChunk {
    let bytes = match encoding {
        TransferEncoding::QuotedPrintable => {
            encode_quoted_printable(data, LINE_LENGTH, line_end).into_bytes()
        }
        TransferEncoding::Base64 => encode_base64(data, LINE_LENGTH, line_end).into_bytes(),
        TransferEncoding::SevenBit | TransferEncoding::EightBit => data.to_vec(),
    };
    EncodedChunk { bytes, line_end }
}

/// Returns true if `byte` must be escaped in Quoted-Printable output.
///
/// Control characters and everything with the high bit set.
#[must_use]
pub const fn needs_escape(byte: u8) -> bool {
    byte < 0x20 || byte >= 0x7F
}

/// Returns true if no byte of `data` needs Quoted-Printable escaping.
#[must_use]
pub fn is_printable(data: &[u8]) -> bool {
    !data.iter().copied().any(needs_escape)
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// One unit of Quoted-Printable output: a literal character or an `=XX`
/// escape. Folding never splits a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QpToken {
    Literal(u8),
    Escaped(u8),
}

impl QpToken {
    pub(crate) const fn width(self) -> usize {
        match self {
            Self::Literal(_) => 1,
            Self::Escaped(_) => 3,
        }
    }

    pub(crate) fn push_to(self, out: &mut String) {
        match self {
            Self::Literal(byte) => out.push(char::from(byte)),
            Self::Escaped(byte) => {
                out.push('=');
                out.push(char::from(HEX[usize::from(byte >> 4)]));
                out.push(char::from(HEX[usize::from(byte & 0x0F)]));
            }
        }
    }
}

/// Escapes `data` into Quoted-Printable tokens.
///
/// Trailing spaces are dropped; `extra` lists additional bytes that must be
/// escaped (header words escape `?`, space and `_`).
pub(crate) fn qp_tokens(data: &[u8], extra: &[u8]) -> Vec<QpToken> {
    let end = data.iter().rposition(|&b| b != b' ').map_or(0, |pos| pos + 1);
    data[..end]
        .iter()
        .map(|&byte| {
            if byte == b'=' || needs_escape(byte) || extra.contains(&byte) {
                QpToken::Escaped(byte)
            } else {
                QpToken::Literal(byte)
            }
        })
        .collect()
}

/// Encodes data using Quoted-Printable encoding (RFC 2045).
///
/// Every control or high-bit byte and every `=` becomes `=XX`. The result
/// is folded with soft line breaks (`=` followed by `line_end`) so that no
/// line, including its trailing `=`, exceeds `line_length` characters.
/// Folding never splits an escape, never leaves a space at the end of a
/// line and never starts a continuation line with `.`, which a careless
/// SMTP relay could take for dot-stuffing. Trailing spaces of the input are
/// not preserved.
///
/// `line_length` values below 4 are treated as 4.
#[must_use]
pub fn encode_quoted_printable(data: &[u8], line_length: usize, line_end: LineEnd) -> String {
    let mut tokens = qp_tokens(data, &[]);
    // Room for the soft-break marker, and always for one escape.
    let max = line_length.saturating_sub(1).max(3);

    let mut out = String::with_capacity(tokens.len() * 2);
    let mut start = 0;
    while start < tokens.len() {
        let mut end = start;
        let mut width = 0;
        while end < tokens.len() && width + tokens[end].width() <= max {
            width += tokens[end].width();
            end += 1;
        }

        if end < tokens.len() {
            while end > start + 1 && tokens[end] == QpToken::Literal(b'.') {
                end -= 1;
            }
            while end > start + 1 && tokens[end - 1] == QpToken::Literal(b' ') {
                end -= 1;
            }
            // Nothing left to rewind into: escape instead.
            if tokens[end] == QpToken::Literal(b'.') {
                tokens[end] = QpToken::Escaped(b'.');
            }
            if tokens[end - 1] == QpToken::Literal(b' ') {
                tokens[end - 1] = QpToken::Escaped(b' ');
            }
        }

        for token in &tokens[start..end] {
            token.push_to(&mut out);
        }
        if end < tokens.len() {
            out.push('=');
            out.push_str(line_end.as_str());
        }
        start = end;
    }

    out
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// Soft line breaks may use either `=\r\n` or `=\n`.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        match bytes.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => {
                i += 3;
                continue;
            }
            Some([b'\n', ..]) => {
                i += 2;
                continue;
            }
            _ => {}
        }

        let hex = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|_| Error::InvalidEncoding("Invalid hex escape".to_string()))?;
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(byte);
        i += 3;
    }

    Ok(result)
}

/// Encodes data as a single unfolded Base64 line.
#[must_use]
pub fn encode_base64_line(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 folded into lines of `line_length` characters.
///
/// The line length is rounded down to a multiple of four so lines hold
/// whole quanta; values below 4 are treated as 4.
#[must_use]
pub fn encode_base64(data: &[u8], line_length: usize, line_end: LineEnd) -> String {
    let width = (line_length - line_length % 4).max(4);
    let encoded = STANDARD.encode(data);

    encoded
        .as_bytes()
        .chunks(width)
        // Base64 output is pure ASCII.
        .map(|chunk| String::from_utf8_lossy(chunk))
        .collect::<Vec<_>>()
        .join(line_end.as_str())
}

/// Decodes Base64 data, ignoring embedded line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).map_err(Into::into)
}
