//! In-Memory Collection Store
//!
//! This module implements the storage backend for one named collection
//! (`IP`, `SESSION`, `TX`, ...). It is consulted and mutated on every rule
//! evaluation, from many worker threads at once.
//!
//! ## Design Decisions
//!
//! 1. **One RwLock per collection**: reads share the lock, every write takes
//!    it exclusively. Wildcard and regex scans hold the shared lock for their
//!    whole traversal.
//! 2. **Multimap**: a key maps to a bucket of entries, so repeated variables
//!    keep every value. Bucket order is insertion order; "first" always
//!    means the oldest live entry.
//! 3. **Lazy Expiry**: expired entries are never returned, but only leave the
//!    map when something removes them. There is no sweeper thread.
//! 4. **Copy-out**: resolution returns owned values, never references into
//!    the map.
//!
//! ## Lock Discipline
//!
//! ```text
//!   read path                         write path
//!   ─────────                         ──────────
//!   read()  ── scan / lookup          write() ── mutate ── drop
//!      │
//!      ├── collect expired keys
//!      ▼
//!   drop guard
//!      │
//!      ▼
//!   del_if_expired(key) ──> write() ── retain ── drop
//! ```
//!
//! A guard is never held while the other kind of guard is requested.
//! Scans that observe expired entries only remember their keys and purge
//! them after the shared guard is gone.

use super::entry::Entry;
use super::exclusion::KeyExclusion;
use super::key::{compartment_key, CaseFoldKey};
use super::pattern::KeyPattern;
use super::variable::VariableValue;
use crate::config::StoreConfig;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// The storage capability a rule engine consumes.
///
/// "Not found" is never an error: it shows up as `None`, `false`, an
/// unchanged output list, or a no-op write.
///
/// The `*_in` methods address a key nested under compartment segments
/// (`SESSION::<id>::<name>`); they flatten the key with
/// [`compartment_key`] and delegate.
pub trait Collection: Send + Sync {
    /// The collection's name, e.g. `IP`.
    fn name(&self) -> &str;

    /// Inserts a new entry under `key`. Duplicates are kept.
    fn store(&self, key: &str, value: Bytes);

    /// Replaces the value of the first live entry under `key`, or inserts one.
    ///
    /// Returns `true` if an existing entry was updated, `false` if a new
    /// entry was inserted.
    fn store_or_update_first(&self, key: &str, value: Bytes) -> bool;

    /// Replaces the value of the first live entry under `key`.
    ///
    /// Returns `false` and leaves the collection unchanged if there is none.
    fn update_first(&self, key: &str, value: Bytes) -> bool;

    /// Removes every entry under `key`.
    fn del(&self, key: &str);

    /// Removes the expired entries under `key`, returning how many went.
    fn del_if_expired(&self, key: &str) -> usize;

    /// Expires the first live entry under `key` after `seconds`.
    ///
    /// Zero requests immediate expiry. If `key` has no live entry, a
    /// valueless entry carrying the expiry is armed so that a later
    /// update inherits it.
    fn set_expiry(&self, key: &str, seconds: u32);

    /// Returns a copy of the first live value under `key`.
    fn resolve_first(&self, key: &str) -> Option<Bytes>;

    /// Appends every live entry under `key` to `out`, duplicates included.
    fn resolve_single_match(&self, key: &str, out: &mut Vec<VariableValue>);

    /// Wildcard resolution.
    ///
    /// With an empty `key_hint` every live entry of the collection whose
    /// key is not excluded is appended. A non-empty hint restricts the
    /// result to that key's entries, still subject to `exclusions`.
    fn resolve_multi_matches(
        &self,
        key_hint: &str,
        out: &mut Vec<VariableValue>,
        exclusions: &dyn KeyExclusion,
    );

    /// Appends every live entry whose key matches `pattern` and is not
    /// excluded.
    fn resolve_regular_expression(
        &self,
        pattern: &KeyPattern,
        out: &mut Vec<VariableValue>,
        exclusions: &dyn KeyExclusion,
    );

    /// [`store`](Collection::store) under compartment segments.
    fn store_in(&self, compartments: &[&str], key: &str, value: Bytes) {
        self.store(&compartment_key(compartments, key), value)
    }

    /// [`store_or_update_first`](Collection::store_or_update_first) under compartment segments.
    fn store_or_update_first_in(&self, compartments: &[&str], key: &str, value: Bytes) -> bool {
        self.store_or_update_first(&compartment_key(compartments, key), value)
    }

    /// [`update_first`](Collection::update_first) under compartment segments.
    fn update_first_in(&self, compartments: &[&str], key: &str, value: Bytes) -> bool {
        self.update_first(&compartment_key(compartments, key), value)
    }

    /// [`del`](Collection::del) under compartment segments.
    fn del_in(&self, compartments: &[&str], key: &str) {
        self.del(&compartment_key(compartments, key))
    }

    /// [`set_expiry`](Collection::set_expiry) under compartment segments.
    fn set_expiry_in(&self, compartments: &[&str], key: &str, seconds: u32) {
        self.set_expiry(&compartment_key(compartments, key), seconds)
    }

    /// [`resolve_first`](Collection::resolve_first) under compartment segments.
    fn resolve_first_in(&self, compartments: &[&str], key: &str) -> Option<Bytes> {
        self.resolve_first(&compartment_key(compartments, key))
    }

    /// [`resolve_single_match`](Collection::resolve_single_match) under compartment segments.
    fn resolve_single_match_in(
        &self,
        compartments: &[&str],
        key: &str,
        out: &mut Vec<VariableValue>,
    ) {
        self.resolve_single_match(&compartment_key(compartments, key), out)
    }
}

/// Map plus the physical entry count, guarded together.
#[derive(Debug, Default)]
struct Inner {
    map: HashMap<CaseFoldKey, Vec<Entry>>,
    entries: usize,
}

impl Inner {
    /// Drops the expired entries of one bucket. Returns how many went.
    fn purge_bucket(&mut self, key: &CaseFoldKey, now: Instant) -> usize {
        let Some(bucket) = self.map.get_mut(key) else {
            return 0;
        };

        let before = bucket.len();
        bucket.retain(|entry| !entry.is_expired_at(now));
        let removed = before - bucket.len();

        if bucket.is_empty() {
            self.map.remove(key);
        }
        self.entries -= removed;
        removed
    }

    /// First live entry of a bucket, for in-place updates.
    ///
    /// Entries holding a value win over valueless placeholders, so writes
    /// land on the same entry `resolve_first` returns. Call after
    /// `purge_bucket`, which leaves only unexpired entries.
    fn first_live_mut(&mut self, key: &CaseFoldKey) -> Option<&mut Entry> {
        let bucket = self.map.get_mut(key)?;
        let index = bucket.iter().position(Entry::has_value).unwrap_or(0);
        bucket.get_mut(index)
    }

    fn insert(&mut self, key: CaseFoldKey, entry: Entry) {
        self.map.entry(key).or_default().push(entry);
        self.entries += 1;
    }
}

/// In-memory, per-process storage for one named collection.
///
/// # Thread Safety
///
/// Wrap it in an `Arc` (or hold it in a [`Collections`](crate::Collections)
/// registry) and share it across worker threads. All operations are
/// thread-safe and none of them can fail.
///
/// # Example
///
/// ```
/// use flashvars::{Collection, InMemoryCollection};
/// use bytes::Bytes;
///
/// let ip = InMemoryCollection::new("IP");
///
/// ip.store("1.2.3.4::counter", Bytes::from("1"));
/// assert_eq!(ip.resolve_first("1.2.3.4::COUNTER"), Some(Bytes::from("1")));
///
/// // Updates in place rather than adding a duplicate
/// assert!(ip.store_or_update_first("1.2.3.4::counter", Bytes::from("2")));
/// assert_eq!(ip.resolve_first("1.2.3.4::counter"), Some(Bytes::from("2")));
/// assert_eq!(ip.len(), 1);
/// ```
pub struct InMemoryCollection {
    name: Arc<str>,
    config: StoreConfig,
    inner: RwLock<Inner>,

    /// Statistics: resolution calls
    read_count: AtomicU64,
    /// Statistics: store/update/expiry calls
    write_count: AtomicU64,
    /// Statistics: entries removed by `del`
    del_count: AtomicU64,
    /// Statistics: expired entries physically removed
    purged_count: AtomicU64,
}

impl std::fmt::Debug for InMemoryCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCollection")
            .field("name", &self.name)
            .field("entries", &self.len())
            .field("read_count", &self.read_count.load(Ordering::Relaxed))
            .field("write_count", &self.write_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl InMemoryCollection {
    /// Creates an empty collection with default settings.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::with_config(name, StoreConfig::default())
    }

    /// Creates an empty collection with the given settings.
    pub fn with_config(name: impl Into<Arc<str>>, config: StoreConfig) -> Self {
        let inner = Inner {
            map: HashMap::with_capacity(config.initial_capacity),
            entries: 0,
        };

        Self {
            name: name.into(),
            config,
            inner: RwLock::new(inner),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            purged_count: AtomicU64::new(0),
        }
    }

    // A panic inside a critical section leaves the map consistent (every
    // mutation is a single push/retain/remove), so poisoning is ignored.
    #[inline]
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn carrier(&self, key: &CaseFoldKey, value: &Bytes) -> VariableValue {
        VariableValue::new(Arc::clone(&self.name), key.as_str(), value.clone())
    }

    fn record_purged(&self, removed: usize) {
        if removed > 0 {
            self.purged_count
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
    }

    /// Same as [`Collection::set_expiry`] with sub-second precision.
    pub fn set_expiry_after(&self, key: &str, ttl: Duration) {
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let key = CaseFoldKey::from(key);
        let mut inner = self.write();
        let removed = inner.purge_bucket(&key, Instant::now());

        match inner.first_live_mut(&key) {
            Some(entry) => entry.set_expiry(ttl),
            None => inner.insert(key, Entry::expiring_placeholder(ttl)),
        }
        drop(inner);

        self.record_purged(removed);
    }

    /// Remaining time to live of the first live entry under `key`.
    ///
    /// `Some(None)` means the entry exists and never expires.
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let key = CaseFoldKey::from(key);
        let now = Instant::now();
        let inner = self.read();

        inner
            .map
            .get(&key)?
            .iter()
            .find(|entry| entry.live_value(now).is_some())
            .map(Entry::ttl)
    }

    /// Removes every expired entry in the collection.
    ///
    /// There is no background sweeper; callers that want memory back from
    /// keys nobody resolves again can call this from wherever suits them.
    pub fn cleanup_expired(&self) -> u64 {
        let now = Instant::now();
        let mut inner = self.write();
        let before = inner.entries;

        inner.map.retain(|_, bucket| {
            bucket.retain(|entry| !entry.is_expired_at(now));
            !bucket.is_empty()
        });
        let entries: usize = inner.map.values().map(Vec::len).sum();
        inner.entries = entries;
        drop(inner);

        let cleaned = before - entries;
        if cleaned > 0 {
            self.record_purged(cleaned);
            debug!(collection = %self.name, cleaned, "Expired entries cleaned up");
        }
        cleaned as u64
    }

    /// Number of entries physically held, including expired ones not yet
    /// removed.
    pub fn len(&self) -> usize {
        self.read().entries
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns collection statistics.
    pub fn stats(&self) -> CollectionStats {
        CollectionStats {
            entries: self.len() as u64,
            reads: self.read_count.load(Ordering::Relaxed),
            writes: self.write_count.load(Ordering::Relaxed),
            deletes: self.del_count.load(Ordering::Relaxed),
            purged: self.purged_count.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Purges keys a scan saw expired. Must run after the scan's guard is
    /// dropped.
    fn purge_observed(&self, expired: Vec<CaseFoldKey>) {
        if expired.is_empty() {
            return;
        }

        let mut removed = 0;
        for key in &expired {
            removed += self.del_if_expired(key.as_str());
        }
        trace!(
            collection = %self.name,
            keys = expired.len(),
            removed,
            "Purged expired entries observed during scan"
        );
    }

    /// Full scan under the shared lock. Returns keys seen holding expired
    /// entries, when purging is enabled.
    fn scan(
        &self,
        out: &mut Vec<VariableValue>,
        mut select: impl FnMut(&CaseFoldKey) -> bool,
    ) -> Vec<CaseFoldKey> {
        let now = Instant::now();
        let purge = self.config.purge_on_scan;
        let mut expired = Vec::new();

        let inner = self.read();
        for (key, bucket) in inner.map.iter() {
            if !select(key) {
                continue;
            }

            let mut saw_expired = false;
            for entry in bucket {
                if entry.is_expired_at(now) {
                    saw_expired = true;
                } else if let Some(value) = entry.value() {
                    out.push(self.carrier(key, value));
                }
            }

            if purge && saw_expired {
                expired.push(key.clone());
            }
        }

        expired
    }
}

impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn store(&self, key: &str, value: Bytes) {
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let key = CaseFoldKey::from(key);
        let mut inner = self.write();
        inner.insert(key, Entry::new(value));
    }

    fn store_or_update_first(&self, key: &str, value: Bytes) -> bool {
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let key = CaseFoldKey::from(key);
        let mut inner = self.write();
        let removed = inner.purge_bucket(&key, Instant::now());

        let updated = match inner.first_live_mut(&key) {
            Some(entry) => {
                entry.set_value(value);
                true
            }
            None => {
                inner.insert(key, Entry::new(value));
                false
            }
        };
        drop(inner);

        self.record_purged(removed);
        updated
    }

    fn update_first(&self, key: &str, value: Bytes) -> bool {
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let key = CaseFoldKey::from(key);
        let mut inner = self.write();
        let removed = inner.purge_bucket(&key, Instant::now());

        let found = match inner.first_live_mut(&key) {
            Some(entry) => {
                entry.set_value(value);
                true
            }
            None => false,
        };
        drop(inner);

        self.record_purged(removed);
        found
    }

    fn del(&self, key: &str) {
        let key = CaseFoldKey::from(key);
        let mut inner = self.write();

        if let Some(bucket) = inner.map.remove(&key) {
            inner.entries -= bucket.len();
            self.del_count
                .fetch_add(bucket.len() as u64, Ordering::Relaxed);
        }
    }

    fn del_if_expired(&self, key: &str) -> usize {
        let key = CaseFoldKey::from(key);
        let removed = self.write().purge_bucket(&key, Instant::now());

        self.record_purged(removed);
        removed
    }

    fn set_expiry(&self, key: &str, seconds: u32) {
        self.set_expiry_after(key, Duration::from_secs(u64::from(seconds)));
    }

    fn resolve_first(&self, key: &str) -> Option<Bytes> {
        self.read_count.fetch_add(1, Ordering::Relaxed);

        let key = CaseFoldKey::from(key);
        let now = Instant::now();
        let inner = self.read();

        inner
            .map
            .get(&key)?
            .iter()
            .find_map(|entry| entry.live_value(now))
            .cloned()
    }

    fn resolve_single_match(&self, key: &str, out: &mut Vec<VariableValue>) {
        self.read_count.fetch_add(1, Ordering::Relaxed);

        let key = CaseFoldKey::from(key);
        let now = Instant::now();
        let inner = self.read();

        if let Some((stored, bucket)) = inner.map.get_key_value(&key) {
            out.extend(
                bucket
                    .iter()
                    .filter_map(|entry| entry.live_value(now))
                    .map(|value| self.carrier(stored, value)),
            );
        }
    }

    fn resolve_multi_matches(
        &self,
        key_hint: &str,
        out: &mut Vec<VariableValue>,
        exclusions: &dyn KeyExclusion,
    ) {
        self.read_count.fetch_add(1, Ordering::Relaxed);

        if key_hint.is_empty() {
            let expired = self.scan(out, |key| !exclusions.is_excluded(key.as_str()));
            self.purge_observed(expired);
            return;
        }

        let key = CaseFoldKey::from(key_hint);
        let now = Instant::now();
        let inner = self.read();

        if let Some((stored, bucket)) = inner.map.get_key_value(&key) {
            if exclusions.is_excluded(stored.as_str()) {
                return;
            }
            out.extend(
                bucket
                    .iter()
                    .filter_map(|entry| entry.live_value(now))
                    .map(|value| self.carrier(stored, value)),
            );
        }
    }

    fn resolve_regular_expression(
        &self,
        pattern: &KeyPattern,
        out: &mut Vec<VariableValue>,
        exclusions: &dyn KeyExclusion,
    ) {
        self.read_count.fetch_add(1, Ordering::Relaxed);

        let expired = self.scan(out, |key| {
            pattern.is_match(key.as_str()) && !exclusions.is_excluded(key.as_str())
        });
        self.purge_observed(expired);
    }
}

/// Collection statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Entries physically held
    pub entries: u64,
    /// Resolution calls served
    pub reads: u64,
    /// Store, update and expiry calls served
    pub writes: u64,
    /// Entries removed by `del`
    pub deletes: u64,
    /// Expired entries physically removed
    pub purged: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{KeyExclusions, NoExclusions};
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;
    use std::thread;

    fn keys_of(values: &[VariableValue]) -> Vec<String> {
        let mut keys: Vec<String> = values.iter().map(|v| v.key().to_string()).collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_store_and_resolve_first() {
        let ip = InMemoryCollection::new("IP");

        ip.store("1.2.3.4::counter", Bytes::from("1"));
        assert_eq!(ip.resolve_first("1.2.3.4::counter"), Some(Bytes::from("1")));

        assert!(ip.store_or_update_first("1.2.3.4::counter", Bytes::from("2")));
        assert_eq!(ip.resolve_first("1.2.3.4::counter"), Some(Bytes::from("2")));
        assert_eq!(ip.name(), "IP");
    }

    #[test]
    fn test_resolve_first_nonexistent() {
        let tx = InMemoryCollection::new("TX");
        assert_eq!(tx.resolve_first("missing"), None);

        let mut out = Vec::new();
        tx.resolve_single_match("missing", &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_case_insensitive_keys() {
        let tx = InMemoryCollection::new("TX");
        tx.store("Anomaly_Score", Bytes::from("5"));

        for variant in ["anomaly_score", "ANOMALY_SCORE", "aNoMaLy_ScOrE"] {
            assert_eq!(tx.resolve_first(variant), Some(Bytes::from("5")));
        }

        assert!(tx.update_first("ANOMALY_SCORE", Bytes::from("10")));
        assert_eq!(tx.resolve_first("anomaly_score"), Some(Bytes::from("10")));
        assert_eq!(tx.len(), 1);
    }

    #[test]
    fn test_store_keeps_duplicates() {
        let tx = InMemoryCollection::new("TX");
        tx.store("header", Bytes::from("a"));
        tx.store("HEADER", Bytes::from("b"));
        tx.store("Header", Bytes::from("c"));

        assert_eq!(tx.len(), 3);
        assert_eq!(tx.resolve_first("header"), Some(Bytes::from("a")));

        let mut out = Vec::new();
        tx.resolve_single_match("header", &mut out);
        let values: Vec<_> = out.iter().map(|v| v.value().clone()).collect();
        assert_eq!(
            values,
            vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]
        );
        // Carriers report the key as first stored
        assert!(out.iter().all(|v| v.key() == "header" && v.collection() == "TX"));
    }

    #[test]
    fn test_store_or_update_first_suppresses_duplicates() {
        let tx = InMemoryCollection::new("TX");

        assert!(!tx.store_or_update_first("key", Bytes::from("v1")));
        assert!(tx.store_or_update_first("KEY", Bytes::from("v2")));

        let mut out = Vec::new();
        tx.resolve_single_match("key", &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value(), &Bytes::from("v2"));
    }

    #[test]
    fn test_store_or_update_first_touches_only_first() {
        let tx = InMemoryCollection::new("TX");
        tx.store("dup", Bytes::from("a"));
        tx.store("dup", Bytes::from("b"));

        assert!(tx.store_or_update_first("dup", Bytes::from("z")));

        let mut out = Vec::new();
        tx.resolve_single_match("dup", &mut out);
        let values: Vec<_> = out.iter().map(|v| v.value_str().into_owned()).collect();
        assert_eq!(values, vec!["z", "b"]);
    }

    #[test]
    fn test_update_first_absent_key() {
        let tx = InMemoryCollection::new("TX");

        assert!(!tx.update_first("absent", Bytes::from("v")));
        assert_eq!(tx.resolve_first("absent"), None);
        assert_eq!(tx.len(), 0);
    }

    #[test]
    fn test_del_removes_all_entries() {
        let tx = InMemoryCollection::new("TX");
        tx.store("key", Bytes::from("a"));
        tx.store("Key", Bytes::from("b"));
        tx.store("other", Bytes::from("c"));

        tx.del("KEY");

        let mut out = Vec::new();
        tx.resolve_single_match("key", &mut out);
        assert!(out.is_empty());
        assert_eq!(tx.len(), 1);
        assert_eq!(tx.stats().deletes, 2);

        // No-op on a missing key
        tx.del("key");
        assert_eq!(tx.len(), 1);
    }

    #[test]
    fn test_lazy_expiry() {
        let ip = InMemoryCollection::new("IP");
        ip.store("blocked", Bytes::from("1"));
        ip.set_expiry_after("blocked", Duration::from_millis(30));

        assert_eq!(ip.resolve_first("blocked"), Some(Bytes::from("1")));

        thread::sleep(Duration::from_millis(60));

        // Never resolved once expired, though still physically present
        assert_eq!(ip.resolve_first("blocked"), None);
        let mut out = Vec::new();
        ip.resolve_single_match("blocked", &mut out);
        assert!(out.is_empty());
        assert_eq!(ip.len(), 1);
    }

    #[test]
    fn test_set_expiry_in_seconds() {
        let ip = InMemoryCollection::new("IP");
        ip.store("key", Bytes::from("v"));
        ip.set_expiry("key", 1);

        assert_eq!(ip.resolve_first("key"), Some(Bytes::from("v")));
        let ttl = ip.ttl("key").unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(1));

        thread::sleep(Duration::from_millis(1100));
        assert_eq!(ip.resolve_first("key"), None);
    }

    #[test]
    fn test_zero_expiry_is_immediate() {
        let ip = InMemoryCollection::new("IP");
        ip.store("key", Bytes::from("v"));
        ip.set_expiry("key", 0);

        assert_eq!(ip.resolve_first("key"), None);
    }

    #[test]
    fn test_set_expiry_affects_first_entry_only() {
        let tx = InMemoryCollection::new("TX");
        tx.store("dup", Bytes::from("a"));
        tx.store("dup", Bytes::from("b"));
        tx.set_expiry("dup", 0);

        assert_eq!(tx.resolve_first("dup"), Some(Bytes::from("b")));
        assert_eq!(tx.del_if_expired("dup"), 1);
        assert_eq!(tx.len(), 1);
    }

    #[test]
    fn test_set_expiry_on_absent_key_arms_placeholder() {
        let session = InMemoryCollection::new("SESSION");
        session.set_expiry_after("marker", Duration::from_millis(30));

        // The placeholder holds no value, so nothing resolves
        assert_eq!(session.resolve_first("marker"), None);
        assert_eq!(session.len(), 1);

        // A later update fills it in and inherits the expiry
        assert!(session.store_or_update_first("marker", Bytes::from("seen")));
        assert_eq!(session.resolve_first("marker"), Some(Bytes::from("seen")));
        assert_eq!(session.len(), 1);

        thread::sleep(Duration::from_millis(60));
        assert_eq!(session.resolve_first("marker"), None);
    }

    #[test]
    fn test_set_expiry_skips_placeholder_for_stored_value() {
        let ip = InMemoryCollection::new("IP");
        ip.set_expiry("blocked", 60);
        ip.store("blocked", Bytes::from("1"));
        assert_eq!(ip.resolve_first("blocked"), Some(Bytes::from("1")));

        // Lands on the entry callers actually see, not the placeholder
        ip.set_expiry("blocked", 0);
        assert_eq!(ip.resolve_first("blocked"), None);
        assert_eq!(ip.ttl("blocked"), None);
    }

    #[test]
    fn test_updates_skip_placeholder_for_stored_value() {
        let ip = InMemoryCollection::new("IP");
        ip.set_expiry("counter", 60);
        ip.store("counter", Bytes::from("1"));

        assert!(ip.update_first("counter", Bytes::from("2")));
        assert!(ip.store_or_update_first("counter", Bytes::from("3")));
        assert_eq!(ip.resolve_first("counter"), Some(Bytes::from("3")));
        assert_eq!(ip.len(), 2);
    }

    #[test]
    fn test_huge_expiry_does_not_panic() {
        let ip = InMemoryCollection::new("IP");
        ip.store("k", Bytes::from("1"));
        ip.set_expiry_after("k", Duration::MAX);

        assert_eq!(ip.resolve_first("k"), Some(Bytes::from("1")));
        assert_eq!(ip.ttl("k"), Some(None));

        // Absent key: the placeholder carries no expiry and no value
        ip.set_expiry_after("pending", Duration::MAX);
        assert_eq!(ip.resolve_first("pending"), None);
    }

    #[test]
    fn test_writes_replace_expired_entries() {
        let tx = InMemoryCollection::new("TX");
        tx.store("key", Bytes::from("old"));
        tx.set_expiry("key", 0);

        // Logically absent: an update finds nothing, an upsert inserts
        assert!(!tx.update_first("key", Bytes::from("x")));
        assert_eq!(tx.len(), 0);
        assert!(!tx.store_or_update_first("key", Bytes::from("new")));
        assert_eq!(tx.resolve_first("key"), Some(Bytes::from("new")));
        assert_eq!(tx.ttl("key"), Some(None));
        assert_eq!(tx.stats().purged, 1);
    }

    #[test]
    fn test_del_if_expired() {
        let tx = InMemoryCollection::new("TX");
        tx.store("live", Bytes::from("1"));
        tx.store("dead", Bytes::from("2"));
        tx.set_expiry("dead", 0);

        assert_eq!(tx.del_if_expired("live"), 0);
        assert_eq!(tx.del_if_expired("DEAD"), 1);
        assert_eq!(tx.del_if_expired("missing"), 0);
        assert_eq!(tx.len(), 1);
        assert_eq!(tx.resolve_first("live"), Some(Bytes::from("1")));
    }

    #[test]
    fn test_resolve_multi_matches_with_exclusions() {
        let tx = InMemoryCollection::new("TX");
        tx.store("a", Bytes::from("1"));
        tx.store("b", Bytes::from("2"));
        tx.store("c", Bytes::from("3"));

        let mut out = Vec::new();
        tx.resolve_multi_matches("", &mut out, &|key: &str| key == "b");
        assert_eq!(keys_of(&out), vec!["a", "c"]);

        let mut all = Vec::new();
        tx.resolve_multi_matches("", &mut all, &NoExclusions);
        assert_eq!(keys_of(&all), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_resolve_multi_matches_with_key_hint() {
        let tx = InMemoryCollection::new("TX");
        tx.store("arg", Bytes::from("1"));
        tx.store("ARG", Bytes::from("2"));
        tx.store("other", Bytes::from("3"));

        let mut out = Vec::new();
        tx.resolve_multi_matches("Arg", &mut out, &NoExclusions);
        assert_eq!(out.len(), 2);

        let mut excluded = Vec::new();
        let exclusions = KeyExclusions::new().with_name("arg");
        tx.resolve_multi_matches("arg", &mut excluded, &exclusions);
        assert!(excluded.is_empty());
    }

    #[test]
    fn test_resolve_regular_expression() {
        let tx = InMemoryCollection::new("TX");
        tx.store("foo1", Bytes::from("1"));
        tx.store("FOO2", Bytes::from("2"));
        tx.store("bar", Bytes::from("3"));

        let pattern = KeyPattern::new("^foo").unwrap();

        let mut out = Vec::new();
        tx.resolve_regular_expression(&pattern, &mut out, &NoExclusions);
        assert_eq!(keys_of(&out), vec!["FOO2", "foo1"]);

        let mut filtered = Vec::new();
        let exclusions = KeyExclusions::new().with_name("foo2");
        tx.resolve_regular_expression(&pattern, &mut filtered, &exclusions);
        assert_eq!(keys_of(&filtered), vec!["foo1"]);
    }

    #[test]
    fn test_scans_skip_and_purge_expired() {
        let tx = InMemoryCollection::new("TX");
        tx.store("foo_live", Bytes::from("1"));
        tx.store("foo_dead", Bytes::from("2"));
        tx.set_expiry("foo_dead", 0);
        assert_eq!(tx.len(), 2);

        let mut out = Vec::new();
        let pattern = KeyPattern::new("^foo_").unwrap();
        tx.resolve_regular_expression(&pattern, &mut out, &NoExclusions);

        assert_eq!(keys_of(&out), vec!["foo_live"]);
        assert_eq!(tx.len(), 1);
        assert_eq!(tx.stats().purged, 1);
    }

    #[test]
    fn test_scan_purge_can_be_disabled() {
        let config = StoreConfig::default().with_purge_on_scan(false);
        let tx = InMemoryCollection::with_config("TX", config);
        tx.store("dead", Bytes::from("1"));
        tx.set_expiry("dead", 0);

        let mut out = Vec::new();
        tx.resolve_multi_matches("", &mut out, &NoExclusions);
        assert!(out.is_empty());
        assert_eq!(tx.len(), 1);

        assert_eq!(tx.cleanup_expired(), 1);
        assert!(tx.is_empty());
    }

    #[test]
    fn test_placeholders_never_resolve() {
        let tx = InMemoryCollection::new("TX");
        tx.set_expiry("pending", 60);

        let mut out = Vec::new();
        tx.resolve_multi_matches("", &mut out, &NoExclusions);
        tx.resolve_single_match("pending", &mut out);
        assert!(out.is_empty());
        assert_eq!(tx.ttl("pending"), None);
    }

    #[test]
    fn test_compartments() {
        let session = InMemoryCollection::new("SESSION");
        session.store_in(&["abc123"], "score", Bytes::from("4"));

        assert_eq!(
            session.resolve_first("ABC123::SCORE"),
            Some(Bytes::from("4"))
        );
        assert!(session.store_or_update_first_in(&["abc123"], "score", Bytes::from("5")));
        assert!(session.update_first_in(&["abc123"], "score", Bytes::from("6")));
        assert_eq!(
            session.resolve_first_in(&["abc123"], "score"),
            Some(Bytes::from("6"))
        );

        session.store_in(&["web", "abc123"], "marker", Bytes::from("x"));
        let mut out = Vec::new();
        session.resolve_single_match_in(&["web", "abc123"], "marker", &mut out);
        assert_eq!(out[0].full_name(), "SESSION:web::abc123::marker");

        session.set_expiry_in(&["abc123"], "score", 0);
        assert_eq!(session.resolve_first_in(&["abc123"], "score"), None);

        session.del_in(&["web", "abc123"], "marker");
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_copies_are_independent() {
        let tx = InMemoryCollection::new("TX");
        tx.store("key", Bytes::from("original"));

        let mut out = Vec::new();
        tx.resolve_single_match("key", &mut out);
        tx.update_first("key", Bytes::from("changed"));

        assert_eq!(out[0].value(), &Bytes::from("original"));
        assert_eq!(tx.resolve_first("key"), Some(Bytes::from("changed")));
    }

    #[test]
    fn test_stats() {
        let tx = InMemoryCollection::new("TX");
        tx.store("a", Bytes::from("1"));
        tx.store_or_update_first("a", Bytes::from("2"));
        tx.resolve_first("a");
        tx.resolve_first("b");
        tx.del("a");

        let stats = tx.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.reads, 2);
        assert_eq!(stats.deletes, 1);
    }

    #[test]
    fn test_concurrent_reads_do_not_block() {
        let tx = Arc::new(InMemoryCollection::new("TX"));
        tx.store("key", Bytes::from("v"));

        // Stand-in for an in-flight scan
        let guard = tx.read();

        let (sender, receiver) = mpsc::channel();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let tx = Arc::clone(&tx);
                let sender = sender.clone();
                thread::spawn(move || {
                    sender.send(tx.resolve_first("key")).unwrap();
                })
            })
            .collect();

        for _ in 0..4 {
            let value = receiver
                .recv_timeout(Duration::from_secs(5))
                .expect("reader blocked behind another reader");
            assert_eq!(value, Some(Bytes::from("v")));
        }

        drop(guard);
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_writer_waits_for_in_flight_reads() {
        let tx = Arc::new(InMemoryCollection::new("TX"));
        tx.store("key", Bytes::from("1"));

        let guard = tx.read();
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let tx = Arc::clone(&tx);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                tx.store_or_update_first("key", Bytes::from("2"));
                done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst));
        // The reader still sees the pre-write state
        assert_eq!(guard.entries, 1);

        drop(guard);
        writer.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(tx.resolve_first("key"), Some(Bytes::from("2")));
    }

    #[test]
    fn test_concurrent_access() {
        let tx = Arc::new(InMemoryCollection::new("TX"));
        let mut handles = vec![];

        for i in 0..10 {
            let tx = Arc::clone(&tx);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    tx.store(&key, Bytes::from("value"));
                    assert_eq!(tx.resolve_first(&key), Some(Bytes::from("value")));
                    tx.store_or_update_first("shared", Bytes::from(key));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // 1000 distinct keys plus exactly one "shared" entry
        assert_eq!(tx.len(), 1001);
        let mut out = Vec::new();
        tx.resolve_single_match("SHARED", &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_usable_as_trait_object() {
        let collection: Arc<dyn Collection> = Arc::new(InMemoryCollection::new("GLOBAL"));
        collection.store("k", Bytes::from("v"));
        assert_eq!(collection.resolve_first("K"), Some(Bytes::from("v")));
        assert_eq!(collection.name(), "GLOBAL");
    }
}
