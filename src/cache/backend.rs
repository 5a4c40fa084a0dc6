//! Backing Store Module
//!
//! The key-value service recent-key namespaces are persisted in.

use crate::error::Result;

/// Keyed get/set of opaque string values.
///
/// Implementations are not required to be transactional: a read followed by
/// a write may race with another writer, and the last write wins.
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value, or `None` if absent or expired.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores a value, replacing any previous one. `ttl` is in seconds.
    fn set(&self, key: &str, value: String, ttl: Option<u64>) -> Result<()>;
}
