//! # FlashVars - In-Process Variable Collections for WAF Rule Engines
//!
//! FlashVars is the in-memory storage backend behind a web application
//! firewall's persistent variables: per-IP counters, session markers,
//! anomaly score accumulators. The rule engine reads it on every rule
//! evaluation and writes it from `setvar`/`expirevar`-style actions.
//!
//! ## Features
//!
//! - **Case-Insensitive Keys**: `IP:Counter` and `ip:COUNTER` are one variable
//! - **Multi-Valued**: a key can hold several entries, all resolvable
//! - **Lazy Expiry**: expired entries are never returned and are purged
//!   opportunistically, without a background thread
//! - **Four Resolution Strategies**: first, single key, wildcard with
//!   exclusions, and case-insensitive regular expression
//! - **Copy-Out Reads**: callers get owned values, never references into
//!   the store
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              FlashVars                                  │
//! │                                                                         │
//! │  ┌─────────────┐         ┌─────────────────────────────────────────┐    │
//! │  │ Rule engine │ reads   │             Collections                 │    │
//! │  │  workers    │────────>│  ┌────────────┐ ┌────────────┐          │    │
//! │  │  (threads)  │<────────│  │ IP         │ │ SESSION    │  ...     │    │
//! │  │             │ copies  │  │ RwLock     │ │ RwLock     │          │    │
//! │  │             │────────>│  │ multimap   │ │ multimap   │          │    │
//! │  └─────────────┘ writes  │  └────────────┘ └────────────┘          │    │
//! │                          └─────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use flashvars::{Collection, Collections, KeyPattern, NoExclusions};
//! use bytes::Bytes;
//!
//! let collections = Collections::new();
//! let ip = collections.get_or_create("IP").unwrap();
//!
//! // Count requests per client
//! ip.store_or_update_first("1.2.3.4::counter", Bytes::from("1"));
//! ip.store_or_update_first("1.2.3.4::counter", Bytes::from("2"));
//! assert_eq!(ip.resolve_first("1.2.3.4::COUNTER"), Some(Bytes::from("2")));
//!
//! // Block the client for five minutes
//! ip.store_in(&["1.2.3.4"], "blocked", Bytes::from("1"));
//! ip.set_expiry_in(&["1.2.3.4"], "blocked", 300);
//!
//! // Everything we know about the client
//! let mut out = Vec::new();
//! let pattern = KeyPattern::new("^1\\.2\\.3\\.4::").unwrap();
//! ip.resolve_regular_expression(&pattern, &mut out, &NoExclusions);
//! assert_eq!(out.len(), 2);
//! ```
//!
//! ## Module Overview
//!
//! - [`collection`]: the store, its keys, entries and resolution helpers
//! - [`config`]: per-collection settings
//! - [`error`]: errors from the fallible constructors
//!
//! ## Design Highlights
//!
//! ### Thread Safety
//!
//! Each collection has a single RwLock. Reads never block each other; a
//! write waits for every in-flight read, including full wildcard scans.
//! No code path asks for the write lock while holding the read lock.
//!
//! ### Lazy Expiry
//!
//! An entry past its expiry is invisible to every resolution path. It is
//! physically removed when a write touches its key, when a scan notices it
//! (after releasing the shared lock), or when a caller asks for
//! `del_if_expired`/`cleanup_expired`.

pub mod collection;
pub mod config;
pub mod error;

// Re-export commonly used types for convenience
pub use collection::{
    compartment_key, CaseFoldKey, Collection, CollectionStats, Collections, Entry,
    InMemoryCollection, KeyExclusion, KeyExclusions, KeyPattern, NoExclusions, VariableValue,
};
pub use config::StoreConfig;
pub use error::CollectionError;

/// Version of FlashVars
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
