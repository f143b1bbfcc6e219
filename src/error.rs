//! Error types for FlashVars.
//!
//! Store operations never fail: absence is reported through empty results,
//! `false` or silent no-ops. Errors only come out of the few constructors
//! that validate caller input up front, such as compiling a key pattern.

use thiserror::Error;

/// Errors raised while building the inputs a collection consumes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CollectionError {
    /// The key pattern is not a valid regular expression
    #[error("invalid key pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Collection names must be non-empty
    #[error("collection name must not be empty")]
    EmptyCollectionName,
}

/// Convenience alias used by the fallible constructors.
pub type Result<T> = std::result::Result<T, CollectionError>;
