//! Cache Registry Module
//!
//! Maps the cache names used in configuration to cache implementations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cache::{
    KeyValueStore, RecentKeyCache, Session, SessionCache, SharedCache, SESSION_CACHE, SHARED_CACHE,
};
use crate::error::{ConsistencyError, Result};

// == Cache Registry ==
#[derive(Clone, Default)]
pub struct CacheRegistry {
    caches: HashMap<String, Arc<dyn RecentKeyCache>>,
}

impl CacheRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// `"default"` backed by `store`, plus a detached `"session"` cache.
    pub fn standard(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new()
            .with_cache(SHARED_CACHE, Arc::new(SharedCache::new(store)))
            .with_cache(SESSION_CACHE, Arc::new(SessionCache::detached()))
    }

    /// Registers (or replaces) a cache under `name`.
    pub fn with_cache(mut self, name: &str, cache: Arc<dyn RecentKeyCache>) -> Self {
        self.caches.insert(name.to_string(), cache);
        self
    }

    /// A copy whose `"session"` cache is bound to `session`.
    pub fn with_session(&self, session: Arc<Session>) -> Self {
        self.clone()
            .with_cache(SESSION_CACHE, Arc::new(SessionCache::new(session)))
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn RecentKeyCache>> {
        self.caches
            .get(name)
            .cloned()
            .ok_or_else(|| ConsistencyError::UnknownCache(name.to_string()))
    }

    /// Looks up every name, in order. Fails on the first unknown name.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn RecentKeyCache>>> {
        names.iter().map(|name| self.get(name)).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.caches.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    #[test]
    fn test_standard_registry() {
        let registry = CacheRegistry::standard(Arc::new(MemoryStore::new(10)));
        assert_eq!(registry.names(), vec!["default", "session"]);
    }

    #[test]
    fn test_unknown_cache_is_error() {
        let registry = CacheRegistry::standard(Arc::new(MemoryStore::new(10)));
        let err = registry
            .resolve(&["default".to_string(), "memcache".to_string()])
            .err()
            .unwrap();
        assert!(matches!(err, ConsistencyError::UnknownCache(ref n) if n == "memcache"));
    }
}
