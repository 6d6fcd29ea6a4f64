//! Multipart boundary generation.

use crate::encoding::LineEnd;
use md5::{Digest, Md5};
use std::fmt::{self, Write as _};

/// A multipart boundary string.
///
/// Generated boundaries start with `=_`, a sequence Quoted-Printable and
/// Base64 output can never contain, so encoded parts cannot collide with
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Boundary(String);

impl Boundary {
    /// Wraps an explicit boundary string.
    #[must_use]
    pub fn new(boundary: impl Into<String>) -> Self {
        Self(boundary.into())
    }

    /// Returns the boundary as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Delimiter line opening the next part.
    #[must_use]
    pub fn line(&self, line_end: LineEnd) -> String {
        format!("{line_end}--{}{line_end}", self.0)
    }

    /// Delimiter line closing the multipart body.
    #[must_use]
    pub fn end(&self, line_end: LineEnd) -> String {
        format!("{line_end}--{}--{line_end}", self.0)
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces unique boundaries.
///
/// Uniqueness comes from the current time mixed with a counter owned by the
/// generator, so two boundaries drawn from the same generator in the same
/// microsecond still differ. Share one generator per message builder or per
/// process as needed.
#[derive(Debug, Clone, Default)]
pub struct BoundaryGenerator {
    counter: u64,
}

impl BoundaryGenerator {
    /// Creates a generator with its counter at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { counter: 0 }
    }

    /// Creates a generator with its counter at `counter`.
    #[must_use]
    pub const fn starting_at(counter: u64) -> Self {
        Self { counter }
    }

    /// Returns how many boundaries this generator has handed out.
    #[must_use]
    pub const fn counter(&self) -> u64 {
        self.counter
    }

    /// Returns a fresh boundary: `=_` followed by 32 hex digits.
    pub fn next_boundary(&mut self) -> Boundary {
        let micros = chrono::Utc::now().timestamp_micros();
        let seed = format!("{micros}{}", self.counter);
        self.counter = self.counter.wrapping_add(1);

        let digest = Md5::digest(seed.as_bytes());
        let mut boundary = String::with_capacity(34);
        boundary.push_str("=_");
        for byte in digest {
            let _ = write!(boundary, "{byte:02x}");
        }
        Boundary(boundary)
    }
}
