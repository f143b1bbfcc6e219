//! Collections Module
//!
//! Variable storage for the rule engine: named collections of
//! case-insensitive keys, each mapping to one or more values with optional
//! expiry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Collections                           │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐         │
//! │  │ IP           │ │ SESSION      │ │ TX           │  ...    │
//! │  │ RwLock       │ │ RwLock       │ │ RwLock       │         │
//! │  │ key -> [..]  │ │ key -> [..]  │ │ key -> [..]  │         │
//! │  └──────────────┘ └──────────────┘ └──────────────┘         │
//! └─────────────────────────────────────────────────────────────┘
//!          ▲ store / update / del / expiry (exclusive)
//!          │
//!          ▼ resolve first / single / multi / regex (shared)
//!     rule engine worker threads
//! ```
//!
//! ## Resolution Strategies
//!
//! - **First**: `IP:counter` in a numeric comparison, one value
//! - **Single match**: every value stored under one key
//! - **Multi match**: `IP` as a whole, minus exclusions
//! - **Regular expression**: `IP:/^counter_/`, minus exclusions
//!
//! ## Compartments
//!
//! Nested scopes are flattened into one key with `::`, so
//! `SESSION::<id>::<name>` is just a key like any other.

pub mod entry;
pub mod exclusion;
pub mod key;
pub mod pattern;
pub mod registry;
pub mod store;
pub mod variable;

// Re-export commonly used types
pub use entry::Entry;
pub use exclusion::{KeyExclusion, KeyExclusions, NoExclusions};
pub use key::{compartment_key, CaseFoldKey, COMPARTMENT_SEPARATOR};
pub use pattern::KeyPattern;
pub use registry::Collections;
pub use store::{Collection, CollectionStats, InMemoryCollection};
pub use variable::VariableValue;
