//! Property tests for the transfer encodings.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;

use wiremail_mime::encoding::{
    LINE_LENGTH, LineEnd, decode_base64, decode_quoted_printable, encode_base64,
    encode_quoted_printable,
};
use wiremail_mime::header::{decode_rfc2047, encode_base64_header, encode_quoted_printable_header};

fn trim_trailing_spaces(data: &[u8]) -> &[u8] {
    let end = data.iter().rposition(|&b| b != b' ').map_or(0, |pos| pos + 1);
    &data[..end]
}

fn line_end() -> impl Strategy<Value = LineEnd> {
    prop_oneof![Just(LineEnd::Lf), Just(LineEnd::CrLf)]
}

proptest! {
    #[test]
    fn printable_text_passes_through(text in "[ -<>-~]{0,70}") {
        let encoded = encode_quoted_printable(text.as_bytes(), LINE_LENGTH, LineEnd::CrLf);
        prop_assert_eq!(encoded, text.trim_end_matches(' '));
    }

    #[test]
    fn quoted_printable_round_trips(
        data in proptest::collection::vec(any::<u8>(), 0..600),
        line_length in 4usize..120,
        eol in line_end(),
    ) {
        let encoded = encode_quoted_printable(&data, line_length, eol);
        let decoded = decode_quoted_printable(&encoded).unwrap();
        prop_assert_eq!(decoded.as_slice(), trim_trailing_spaces(&data));
    }

    #[test]
    fn quoted_printable_lines_are_bounded_and_dot_safe(
        data in proptest::collection::vec(prop_oneof![Just(b'.'), Just(b' '), any::<u8>()], 0..400),
        line_length in 4usize..80,
        eol in line_end(),
    ) {
        let encoded = encode_quoted_printable(&data, line_length, eol);
        for (i, line) in encoded.split(eol.as_str()).enumerate() {
            prop_assert!(line.len() <= line_length, "line {} too long: {:?}", i, line);
            if i > 0 {
                prop_assert!(!line.starts_with('.'), "line {} starts with a dot", i);
            }
            let content = line.strip_suffix('=').unwrap_or(line);
            prop_assert!(!content.ends_with(' ') || !line.ends_with('='), "soft line ends on a space");
        }
    }

    #[test]
    fn base64_round_trips(
        data in proptest::collection::vec(any::<u8>(), 0..1200),
        line_length in 0usize..120,
        eol in line_end(),
    ) {
        let encoded = encode_base64(&data, line_length, eol);
        let width = (line_length - line_length % 4).max(4);
        prop_assert!(encoded.split(eol.as_str()).all(|line| line.len() <= width));
        prop_assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn q_header_round_trips(text in "\\PC{0,120}", line_length in 20usize..100) {
        let encoded = encode_quoted_printable_header(text.as_bytes(), "UTF-8", line_length, LineEnd::CrLf);
        prop_assert_eq!(decode_rfc2047(&encoded).unwrap(), text.trim_end_matches(' '));
    }

    #[test]
    fn b_header_round_trips(text in "\\PC{0,120}", line_length in 20usize..100) {
        let encoded = encode_base64_header(text.as_bytes(), "UTF-8", line_length, LineEnd::Lf);
        for word in encoded.split("\n ") {
            prop_assert!(word.len() <= line_length);
        }
        prop_assert_eq!(decode_rfc2047(&encoded).unwrap(), text);
    }
}

#[test]
fn base64_padding_cases() {
    for len in [0usize, 1, 2, 3, 1000] {
        let data = vec![0x5Au8; len];
        let encoded = encode_base64(&data, LINE_LENGTH, LineEnd::CrLf);
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }
}
