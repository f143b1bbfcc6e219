//! Resolved Variable Values
//!
//! A [`VariableValue`] is what resolution hands back to the rule engine.
//! It owns everything it carries, so nothing a caller does with it can
//! reach back into the collection after the lock is released.

use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// One resolved `(collection, key, value)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableValue {
    collection: Arc<str>,
    key: String,
    value: Bytes,
}

impl VariableValue {
    pub fn new(collection: Arc<str>, key: impl Into<String>, value: Bytes) -> Self {
        Self {
            collection,
            key: key.into(),
            value,
        }
    }

    /// Name of the collection the value was resolved from (e.g. `IP`).
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The key as spelled in the collection.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// The value as text, replacing invalid UTF-8.
    pub fn value_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    /// `COLLECTION:key`, the name rule logs and audit records use.
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.collection, self.key)
    }

    /// Consumes the carrier, returning its value.
    pub fn into_value(self) -> Bytes {
        self.value
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}={}", self.collection, self.key, self.value_str())
    }
}
