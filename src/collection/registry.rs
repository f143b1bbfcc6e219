//! Collection Registry
//!
//! Holds the named collections of one engine instance (`IP`, `SESSION`,
//! `GLOBAL`, ...) and hands out shared handles to them. The registry is
//! owned by whoever owns the engine; it lives from process start to
//! shutdown and is passed explicitly rather than looked up globally.
//!
//! ## Example
//!
//! ```
//! use flashvars::{Collection, Collections};
//! use bytes::Bytes;
//!
//! let collections = Collections::new();
//!
//! let ip = collections.get_or_create("IP").unwrap();
//! ip.store("1.2.3.4::counter", Bytes::from("1"));
//!
//! // Names are case-insensitive, and handles share the same storage
//! let same = collections.get("ip").unwrap();
//! assert_eq!(same.resolve_first("1.2.3.4::counter"), Some(Bytes::from("1")));
//! ```

use super::key::CaseFoldKey;
use super::store::InMemoryCollection;
use crate::config::StoreConfig;
use crate::error::{CollectionError, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Named in-memory collections.
#[derive(Debug, Default)]
pub struct Collections {
    config: StoreConfig,
    collections: RwLock<HashMap<CaseFoldKey, Arc<InMemoryCollection>>>,
}

impl Collections {
    /// Creates an empty registry with default collection settings.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates an empty registry; every collection it creates uses `config`.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the named collection, creating it on first use.
    pub fn get_or_create(&self, name: &str) -> Result<Arc<InMemoryCollection>> {
        if name.is_empty() {
            return Err(CollectionError::EmptyCollectionName);
        }

        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        // Another thread may have created it between the two locks
        let collection = collections
            .entry(CaseFoldKey::from(name))
            .or_insert_with(|| {
                debug!(collection = name, "Creating in-memory collection");
                Arc::new(InMemoryCollection::with_config(name, self.config.clone()))
            });

        Ok(Arc::clone(collection))
    }

    /// Returns the named collection if it exists.
    pub fn get(&self, name: &str) -> Option<Arc<InMemoryCollection>> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&CaseFoldKey::from(name))
            .cloned()
    }

    /// Removes the named collection from the registry.
    ///
    /// Handles already given out keep working on the detached collection.
    pub fn remove(&self, name: &str) -> Option<Arc<InMemoryCollection>> {
        let removed = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&CaseFoldKey::from(name));

        if removed.is_some() {
            debug!(collection = name, "Removed in-memory collection");
        }
        removed
    }

    /// Names of all registered collections, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .map(|key| key.as_str().to_string())
            .collect();
        names.sort();
        names
    }

    /// Removes expired entries from every collection.
    pub fn cleanup_expired(&self) -> u64 {
        // Clone the handles so no registry lock is held while collections
        // take their own write locks
        let collections: Vec<_> = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        collections.iter().map(|c| c.cleanup_expired()).sum()
    }

    pub fn len(&self) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
