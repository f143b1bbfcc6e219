//! Collection Configuration
//!
//! Settings applied to every collection a [`Collections`](crate::Collections)
//! registry creates.
//!
//! ## Example
//!
//! ```
//! use flashvars::StoreConfig;
//!
//! let config = StoreConfig::default()
//!     .with_purge_on_scan(false)
//!     .with_initial_capacity(1024);
//! assert!(!config.purge_on_scan);
//! ```

/// Configuration for an in-memory collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Physically remove entries that a wildcard or regex scan observed as
    /// expired, once the scan has released its shared lock (default: true)
    pub purge_on_scan: bool,

    /// Number of distinct keys to reserve room for up front (default: 64)
    pub initial_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            purge_on_scan: true,
            initial_capacity: 64,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the opportunistic purge after scans.
    pub fn with_purge_on_scan(mut self, enabled: bool) -> Self {
        self.purge_on_scan = enabled;
        self
    }

    /// Sets how many distinct keys the backing map reserves room for.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}
