//! Cache Module
//!
//! Backing key-value stores and the recent-key caches layered on top of them.

mod backend;
mod entry;
mod memory;
mod namespace;
mod recent;
mod registry;
mod session;
mod stats;


// Re-export public types
pub use backend::KeyValueStore;
pub use entry::StoredValue;
pub use memory::MemoryStore;
pub use namespace::{Namespace, TrackedKey};
pub use recent::{RecentKeyCache, SessionCache, SharedCache};
pub use registry::CacheRegistry;
pub use session::{Session, SessionRegistry};
pub use stats::StoreStats;

// == Public Constants ==
/// Registry name of the shared backing cache
pub const SHARED_CACHE: &str = crate::config::DEFAULT_CACHE;

/// Registry name of the per-session cache
pub const SESSION_CACHE: &str = "session";
