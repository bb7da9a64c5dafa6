//! Parsing and lookup of range API response bodies.
//!
//! A range response is line oriented text, one `SUFFIX:COUNT` pair per line:
//!
//! ```text
//! 0018A45C4D1DEF81644B54AB7F969B88D65:1
//! 00D4F6E8FA6EECAD2A3AA415EEC418D38EC:2
//! 011053FD0102E94D6AE2F8B83D76FAF94F6:0
//! ```
//!
//! Lines with a count of zero are padding the API adds to hide the real size
//! of the result set. The API does not promise the suffixes are sorted (though
//! in practice they are), so parsing records whether they were, and lookups
//! binary search only when that holds.

use std::cmp::Ordering;
use std::io::{self, Read};

use bytes::{Buf, BytesMut};

use crate::hash::{SUFFIX_LEN, Suffix};

/// Usual responses are around 42KB.
const DEFAULT_CAPACITY: usize = 42 * 1024;

/// Raw body bytes of one range response and the suffixes parsed out of them.
#[derive(Debug)]
pub struct ResponseBuffer {
    raw: BytesMut,
    suffixes: Vec<Suffix>,
    suffixes_sorted: bool,
    parsed: bool,
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&[u8]> for ResponseBuffer {
    fn from(body: &[u8]) -> Self {
        let mut buf = Self::with_capacity(body.len());
        buf.extend_from_slice(body);
        buf
    }
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            raw: BytesMut::with_capacity(capacity),
            suffixes: Vec::new(),
            suffixes_sorted: true,
            parsed: false,
        }
    }

    /// Appends raw body bytes.
    pub fn extend_from_slice(&mut self, body: &[u8]) {
        self.raw.extend_from_slice(body);
    }

    /// Raw bytes not yet parsed or read. Empty once [`parse`](Self::parse) ran.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Parses the raw body into suffixes and drops the raw bytes.
    ///
    /// Lines that are not `SUFFIX:COUNT` are skipped, as are padding lines
    /// with a zero count. Once any suffix compares less than or equal to the
    /// last kept one, the buffer is permanently marked unsorted.
    pub fn parse(&mut self) {
        let raw = std::mem::take(&mut self.raw);
        self.parsed = true;

        for line in raw[..].split(|&b| b == b'\n') {
            let Some((suffix, occurrences)) = parse_line(line) else {
                continue;
            };

            if self.suffixes_sorted && self.suffixes.last().is_some_and(|last| *last >= suffix) {
                self.suffixes_sorted = false;
            }

            if occurrences {
                self.suffixes.push(suffix);
            }
        }
    }

    /// Checks whether `suffix` was present with a non-zero count.
    pub fn lookup(&self, suffix: &Suffix) -> bool {
        if !self.suffixes_sorted {
            return self.suffixes.iter().any(|s| s == suffix);
        }

        binary_search_suffix(&self.suffixes, suffix)
    }

    pub fn suffixes(&self) -> &[Suffix] {
        &self.suffixes
    }

    pub fn suffixes_sorted(&self) -> bool {
        self.suffixes_sorted
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed
    }
}

/// Reads the raw body. Yields nothing after [`ResponseBuffer::parse`].
impl Read for ResponseBuffer {
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        let n = into.len().min(self.raw.len());
        into[..n].copy_from_slice(&self.raw[..n]);
        self.raw.advance(n);
        Ok(n)
    }
}

/// Matches `^[0-9A-Fa-f]{35}:[0-9]+\s*$`.
///
/// Returns the suffix and whether its count is non-zero.
fn parse_line(line: &[u8]) -> Option<(Suffix, bool)> {
    let line = line.trim_ascii_end();
    if line.len() <= SUFFIX_LEN + 1 || line[SUFFIX_LEN] != b':' {
        return None;
    }

    let count = &line[SUFFIX_LEN + 1..];
    if !count.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let suffix = Suffix::from_hex_bytes(&line[..SUFFIX_LEN])?;

    Some((suffix, count.iter().any(|&c| c != b'0')))
}

/// Binary searches sorted suffixes for the first entry not less than `key`
/// and checks it for equality.
#[inline]
pub fn binary_search_suffix(suffixes: &[Suffix], key: &Suffix) -> bool {
    let mut low = 0usize;
    let mut high = suffixes.len();

    while low < high {
        let mid = low + (high - low) / 2;

        match suffixes[mid].cmp(key) {
            Ordering::Less => low = mid + 1,
            Ordering::Equal | Ordering::Greater => high = mid,
        }
    }

    suffixes.get(low) == Some(key)
}
