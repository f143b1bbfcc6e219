//! Key Patterns
//!
//! Regex resolution (`IP:/^counter_/` in rule syntax) tests each key in a
//! collection against a [`KeyPattern`]. Patterns always match
//! case-insensitively, consistent with how keys compare for equality, and
//! search anywhere in the key unless anchored.

use crate::error::{CollectionError, Result};
use regex::{Regex, RegexBuilder};
use std::fmt;

/// A compiled, case-insensitive key pattern.
#[derive(Clone)]
pub struct KeyPattern {
    regex: Regex,
}

impl KeyPattern {
    /// Compiles `pattern`.
    ///
    /// This is the only fallible step of regex resolution; once compiled, a
    /// pattern can be used against any collection without errors.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| CollectionError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { regex })
    }

    /// Returns true if the pattern matches anywhere in `key`.
    #[inline]
    pub fn is_match(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// The source text of the pattern.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyPattern").field(&self.as_str()).finish()
    }
}

impl std::str::FromStr for KeyPattern {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
