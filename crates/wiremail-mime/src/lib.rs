//! # wiremail-mime
//!
//! MIME transfer encodings for outgoing mail.
//!
//! ## Features
//!
//! - **Quoted-Printable**: RFC 2045 body encoding with SMTP-safe folding
//! - **Base64**: folded to whole quanta per line
//! - **RFC 2047**: `Q` and `B` encoded words for header values, charset
//!   detection and decoding
//! - **Boundaries**: collision-free multipart boundaries without global state
//!
//! ## Quick Start
//!
//! ```
//! use wiremail_mime::encoding::{LINE_LENGTH, LineEnd, encode_quoted_printable};
//! use wiremail_mime::header::{detect_charset, encode_quoted_printable_header};
//!
//! let body = encode_quoted_printable("Grüße".as_bytes(), LINE_LENGTH, LineEnd::CrLf);
//! assert_eq!(body, "Gr=C3=BC=C3=9Fe");
//!
//! let subject = encode_quoted_printable_header(b"Hi there", "UTF-8", LINE_LENGTH, LineEnd::CrLf);
//! assert_eq!(subject, "=?UTF-8?Q?Hi=20there?=");
//! assert_eq!(detect_charset(&subject), "UTF-8");
//! ```
//!
//! ## Modules
//!
//! - [`encoding`]: body transfer encodings
//! - [`header`]: RFC 2047 encoded words
//! - [`boundary`]: multipart boundaries

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;

pub mod boundary;
pub mod encoding;
pub mod header;

pub use boundary::{Boundary, BoundaryGenerator};
pub use encoding::{EncodedChunk, LINE_LENGTH, LineEnd, TransferEncoding, encode, is_printable};
pub use error::{Error, Result};
