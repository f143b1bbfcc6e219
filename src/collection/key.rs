//! Case-Insensitive Collection Keys
//!
//! Variable names in rule languages are case-insensitive: `IP:Counter` and
//! `ip:COUNTER` address the same entry. [`CaseFoldKey`] carries that rule
//! into the hash map itself so every lookup path agrees on it.
//!
//! Two keys are equal iff they have the same length and are equal under
//! ASCII case folding. The hash feeds the ASCII-lowercased bytes, so equal
//! keys always hash equally.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Separator placed between compartment segments and the leaf key.
pub const COMPARTMENT_SEPARATOR: &str = "::";

/// A map key compared and hashed under ASCII case folding.
///
/// The original spelling is kept and is what resolution hands back.
#[derive(Clone)]
pub struct CaseFoldKey {
    raw: String,
}

impl CaseFoldKey {
    /// Wraps a key, keeping its spelling.
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Returns the key as first spelled.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Case-insensitive comparison against a plain string.
    #[inline]
    pub fn matches(&self, other: &str) -> bool {
        self.raw.len() == other.len() && self.raw.eq_ignore_ascii_case(other)
    }
}

impl PartialEq for CaseFoldKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.raw)
    }
}

impl Eq for CaseFoldKey {}

impl Hash for CaseFoldKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.raw.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        // Same terminator `str` uses, keeps prefixes from colliding in tuples
        state.write_u8(0xff);
    }
}

impl fmt::Debug for CaseFoldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.raw, f)
    }
}

impl fmt::Display for CaseFoldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for CaseFoldKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for CaseFoldKey {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

/// Builds the flat key for a leaf key nested under compartment segments.
///
/// ```
/// use flashvars::collection::compartment_key;
///
/// assert_eq!(compartment_key(&["abc123"], "score"), "abc123::score");
/// assert_eq!(compartment_key(&["web", "abc123"], "score"), "web::abc123::score");
/// assert_eq!(compartment_key(&[], "score"), "score");
/// ```
pub fn compartment_key(segments: &[&str], leaf: &str) -> String {
    let len = segments
        .iter()
        .map(|s| s.len() + COMPARTMENT_SEPARATOR.len())
        .sum::<usize>()
        + leaf.len();

    let mut key = String::with_capacity(len);
    for segment in segments {
        key.push_str(segment);
        key.push_str(COMPARTMENT_SEPARATOR);
    }
    key.push_str(leaf);
    key
}
