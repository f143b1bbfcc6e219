//! Key Exclusions
//!
//! Wildcard and regex resolution skip any key the caller's exclusion
//! predicate rejects. In rule syntax this is `!IP:counter` (an exact name)
//! or `!IP:/^tmp_/` (a pattern).
//!
//! Predicates are pure queries. Any closure `Fn(&str) -> bool` works, as do
//! [`NoExclusions`] and the concrete [`KeyExclusions`] set.

use super::key::CaseFoldKey;
use super::pattern::KeyPattern;
use crate::error::Result;

/// Answers whether a key must be skipped during wildcard/regex resolution.
pub trait KeyExclusion {
    fn is_excluded(&self, key: &str) -> bool;
}

impl<F> KeyExclusion for F
where
    F: Fn(&str) -> bool,
{
    #[inline]
    fn is_excluded(&self, key: &str) -> bool {
        self(key)
    }
}

/// Excludes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExclusions;

impl KeyExclusion for NoExclusions {
    #[inline]
    fn is_excluded(&self, _key: &str) -> bool {
        false
    }
}

/// A set of excluded key names and key patterns.
///
/// Names compare the same way collection keys do (ASCII case folding).
///
/// ```
/// use flashvars::collection::{KeyExclusion, KeyExclusions};
///
/// let exclusions = KeyExclusions::new()
///     .with_name("csrf_token")
///     .with_pattern("^tmp_")
///     .unwrap();
///
/// assert!(exclusions.is_excluded("CSRF_TOKEN"));
/// assert!(exclusions.is_excluded("tmp_score"));
/// assert!(!exclusions.is_excluded("counter"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyExclusions {
    names: Vec<CaseFoldKey>,
    patterns: Vec<KeyPattern>,
}

impl KeyExclusions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exact key name to exclude.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(CaseFoldKey::new(name));
        self
    }

    /// Adds a compiled pattern to exclude.
    pub fn with_key_pattern(mut self, pattern: KeyPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    /// Compiles and adds a pattern to exclude.
    pub fn with_pattern(self, pattern: &str) -> Result<Self> {
        Ok(self.with_key_pattern(KeyPattern::new(pattern)?))
    }

    pub fn len(&self) -> usize {
        self.names.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.patterns.is_empty()
    }
}

impl KeyExclusion for KeyExclusions {
    fn is_excluded(&self, key: &str) -> bool {
        self.names.iter().any(|name| name.matches(key))
            || self.patterns.iter().any(|pattern| pattern.is_match(key))
    }
}
