//! Collection Entries
//!
//! An [`Entry`] is one stored value plus an optional expiry instant.
//! Expiry is lazy: an expired entry stays in the map until something
//! removes it, but no resolution path ever returns it.

use bytes::Bytes;
use std::time::{Duration, Instant};

/// A stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The stored value. `None` when an expiry was armed before any value
    /// was written for the key.
    value: Option<Bytes>,
    /// When this entry expires (None = never expires)
    expires_at: Option<Instant>,
}

impl Entry {
    /// Creates a new entry without expiry.
    pub fn new(value: Bytes) -> Self {
        Self {
            value: Some(value),
            expires_at: None,
        }
    }

    /// Creates a valueless entry that only carries an expiry.
    pub fn expiring_placeholder(ttl: Duration) -> Self {
        let mut entry = Self {
            value: None,
            expires_at: None,
        };
        entry.set_expiry(ttl);
        entry
    }

    /// Returns the stored value, if one has been written.
    #[inline]
    pub fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }

    #[inline]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Replaces the value in place, leaving any expiry untouched.
    pub fn set_value(&mut self, value: Bytes) {
        self.value = Some(value);
    }

    /// Returns the expiry instant, if any.
    #[inline]
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Arms (or re-arms) the expiry at `now + ttl`.
    ///
    /// A zero `ttl` expires the entry immediately. A `ttl` too large for the
    /// clock to represent leaves the entry without expiry.
    pub fn set_expiry(&mut self, ttl: Duration) {
        self.expires_at = Instant::now().checked_add(ttl);
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Checks expiry against a caller-supplied instant, so a whole scan can
    /// judge every entry against the same clock reading.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Returns the live value at `now`: present and not yet expired.
    #[inline]
    pub(crate) fn live_value(&self, now: Instant) -> Option<&Bytes> {
        if self.is_expired_at(now) {
            None
        } else {
            self.value.as_ref()
        }
    }

    /// Returns the remaining time to live, or None if no expiry is set.
    pub fn ttl(&self) -> Option<Duration> {
        self.expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }
}
