//! Recent Key Caches
//!
//! Each variant keeps a `Namespace` per record type somewhere different.
//! All of them prune expired keys whenever they touch a namespace.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{KeyValueStore, Namespace, Session};
use crate::config::ModelConfig;
use crate::error::Result;
use crate::record::PrimaryKey;

/// A place recent keys are kept.
///
/// `namespace` is the record type's namespace key; `now` is the tracker's
/// notion of the current time.
pub trait RecentKeyCache: Send + Sync {
    /// Live keys in the namespace.
    fn get_pks(
        &self,
        namespace: &str,
        config: &ModelConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<PrimaryKey>>;

    /// Records `pk` as written at `now`.
    fn add(
        &self,
        namespace: &str,
        pk: &PrimaryKey,
        config: &ModelConfig,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Removes `pk`. Returns true if the namespace was written back.
    fn remove(
        &self,
        namespace: &str,
        pk: &PrimaryKey,
        config: &ModelConfig,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}

// == Shared Cache ==
/// Recent keys kept in a shared `KeyValueStore`, visible to every process
/// using that store.
///
/// Updates are read-modify-write without check-and-set: two writers racing
/// on one namespace can lose an update.
#[derive(Clone)]
pub struct SharedCache {
    store: Arc<dyn KeyValueStore>,
}

impl SharedCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn load(&self, namespace: &str) -> Result<Namespace> {
        let raw = self.store.get(namespace)?;
        Namespace::decode(raw.as_deref())
    }
}

impl RecentKeyCache for SharedCache {
    fn get_pks(
        &self,
        namespace: &str,
        config: &ModelConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<PrimaryKey>> {
        // Pruned copy only; the store is rewritten on the next add/remove
        let mut ns = self.load(namespace)?;
        ns.prune(now, config.retention());
        Ok(ns.keys().cloned().collect())
    }

    fn add(
        &self,
        namespace: &str,
        pk: &PrimaryKey,
        config: &ModelConfig,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut ns = self.load(namespace)?;
        let pruned = ns.prune(now, config.retention());
        ns.insert(pk.clone(), now);
        debug!("{}: add {} (pruned {})", namespace, pk, pruned);
        self.store.set(namespace, ns.encode()?, Some(store_ttl(config)))
    }

    fn remove(
        &self,
        namespace: &str,
        pk: &PrimaryKey,
        config: &ModelConfig,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut ns = self.load(namespace)?;
        let pruned = ns.prune(now, config.retention());
        let removed = ns.remove(pk);

        if pruned == 0 && !removed {
            debug!("{}: {} not tracked, skipping write", namespace, pk);
            return Ok(false);
        }
        self.store.set(namespace, ns.encode()?, Some(store_ttl(config)))?;
        Ok(true)
    }
}

/// Backing-store TTL for a namespace value.
///
/// One second past `cache_time`, since an entry exactly `cache_time` old is
/// still live.
fn store_ttl(config: &ModelConfig) -> u64 {
    config.cache_time.saturating_add(1)
}

// == Session Cache ==
/// Recent keys visible only to the session that wrote them.
///
/// A detached cache (no session in scope) reads nothing and ignores writes.
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    session: Option<Arc<Session>>,
}

impl SessionCache {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn detached() -> Self {
        Self { session: None }
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }
}

impl RecentKeyCache for SessionCache {
    fn get_pks(
        &self,
        namespace: &str,
        config: &ModelConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<PrimaryKey>> {
        let Some(session) = &self.session else {
            return Ok(Vec::new());
        };
        let namespaces = session.namespaces()?;
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        let mut ns = ns.clone();
        ns.prune(now, config.retention());
        Ok(ns.keys().cloned().collect())
    }

    fn add(
        &self,
        namespace: &str,
        pk: &PrimaryKey,
        config: &ModelConfig,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        let mut namespaces = session.namespaces()?;
        let ns = namespaces.entry(namespace.to_string()).or_default();
        ns.prune(now, config.retention());
        ns.insert(pk.clone(), now);
        Ok(())
    }

    fn remove(
        &self,
        namespace: &str,
        pk: &PrimaryKey,
        config: &ModelConfig,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(session) = &self.session else {
            return Ok(false);
        };
        let mut namespaces = session.namespaces()?;
        match namespaces.get_mut(namespace) {
            Some(ns) if !ns.is_empty() => {
                let pruned = ns.prune(now, config.retention());
                Ok(ns.remove(pk) || pruned > 0)
            }
            _ => Ok(false),
        }
    }
}
