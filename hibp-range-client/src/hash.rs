//! SHA1 hashing of passwords and the prefix/suffix split used by the range API.

use std::fmt;

use sha1::{Digest, Sha1};

/// The length of a SHA1 hash prefix sent to the range API (5 hex characters).
pub const PREFIX_LEN: usize = 5;

/// The length of the hash suffix kept locally (35 hex characters).
pub const SUFFIX_LEN: usize = 35;

/// The length of a full SHA1 hash rendered as hex.
pub const HASH_HEX_LEN: usize = PREFIX_LEN + SUFFIX_LEN;

/// Hex lookup table for uppercase rendering.
pub const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

/// Copies `input` into a fixed-size array of uppercase hex digits.
///
/// Returns `None` if the length is wrong or any byte is not a hex digit.
fn normalize_hex<const N: usize>(input: &[u8]) -> Option<[u8; N]> {
    if input.len() != N {
        return None;
    }

    let mut out = [0u8; N];
    for (dst, &c) in out.iter_mut().zip(input) {
        if !c.is_ascii_hexdigit() {
            return None;
        }
        *dst = c.to_ascii_uppercase();
    }

    Some(out)
}

/// The first 5 uppercase hex characters of a SHA1 hash.
///
/// This is the only part of the hash that leaves the process; it names the
/// range to download and keys both the request table and the cache.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix([u8; PREFIX_LEN]);

impl Prefix {
    /// Parses a 5 character hex string, accepting either case.
    pub fn parse(input: &str) -> Option<Self> {
        normalize_hex(input.as_bytes()).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; PREFIX_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: constructed only from uppercase ASCII hex digits
        unsafe { std::str::from_utf8_unchecked(&self.0) }
    }
}

/// The remaining 35 uppercase hex characters of a SHA1 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Suffix([u8; SUFFIX_LEN]);

impl Suffix {
    /// Parses a 35 character hex string, accepting either case.
    pub fn parse(input: &str) -> Option<Self> {
        Self::from_hex_bytes(input.as_bytes())
    }

    pub(crate) fn from_hex_bytes(input: &[u8]) -> Option<Self> {
        normalize_hex(input).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; SUFFIX_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: constructed only from uppercase ASCII hex digits
        unsafe { std::str::from_utf8_unchecked(&self.0) }
    }
}

macro_rules! impl_hex_fmt {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($ty)).field(&self.as_str()).finish()
            }
        }
    )*};
}

impl_hex_fmt!(Prefix, Suffix);

/// A SHA1 password hash as 40 uppercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PasswordHash {
    hex: [u8; HASH_HEX_LEN],
}

impl PasswordHash {
    /// Hashes `password` with SHA1.
    pub fn new(password: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(password.as_bytes());
        let digest: [u8; 20] = hasher.finalize().into();

        Self::from_digest(&digest)
    }

    /// Renders a raw 20-byte SHA1 digest.
    pub fn from_digest(digest: &[u8; 20]) -> Self {
        let mut hex = [0u8; HASH_HEX_LEN];
        for (pair, &byte) in hex.chunks_exact_mut(2).zip(digest) {
            pair[0] = HEX_CHARS[(byte >> 4) as usize];
            pair[1] = HEX_CHARS[(byte & 0x0f) as usize];
        }

        Self { hex }
    }

    /// Accepts an already computed SHA1 hash as 40 hex characters in either case.
    pub fn from_hex(input: &str) -> Option<Self> {
        normalize_hex(input.as_bytes()).map(|hex| Self { hex })
    }

    #[inline]
    pub fn prefix(&self) -> Prefix {
        let mut prefix = [0u8; PREFIX_LEN];
        prefix.copy_from_slice(&self.hex[..PREFIX_LEN]);
        Prefix(prefix)
    }

    #[inline]
    pub fn suffix(&self) -> Suffix {
        let mut suffix = [0u8; SUFFIX_LEN];
        suffix.copy_from_slice(&self.hex[PREFIX_LEN..]);
        Suffix(suffix)
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: constructed only from uppercase ASCII hex digits
        unsafe { std::str::from_utf8_unchecked(&self.hex) }
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHash").field("prefix", &self.prefix().as_str()).finish_non_exhaustive()
    }
}
