//! Memory Store Module
//!
//! In-process `KeyValueStore` with TTL expiry and a capacity bound.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::cache::{KeyValueStore, StoreStats, StoredValue};
use crate::clock::{Clock, SystemClock};
use crate::error::{ConsistencyError, Result};

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, StoredValue>,
    stats: StoreStats,
}

// == Memory Store ==
/// Shared in-process backing store.
///
/// Each `get`/`set` is atomic on its own; nothing spans a read and the
/// following write.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    max_entries: usize,
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
            max_entries,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| ConsistencyError::Backend("memory store lock poisoned".to_string()))
    }

    /// Current statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        let inner = self.lock()?;
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.values.len());
        Ok(stats)
    }

    /// Drops every expired value and returns how many were removed.
    pub fn cleanup_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let before = inner.values.len();
        inner.values.retain(|_, v| !v.is_expired(now));
        let removed = before - inner.values.len();
        let total = inner.values.len();
        inner.stats.set_total_entries(total);
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let inner = &mut *guard;

        let expired = match inner.values.get(key) {
            Some(stored) if !stored.is_expired(now) => {
                let value = stored.value.clone();
                inner.stats.record_hit();
                return Ok(Some(value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.values.remove(key);
            let total = inner.values.len();
            inner.stats.set_total_entries(total);
        }
        inner.stats.record_miss();
        Ok(None)
    }

    fn set(&self, key: &str, value: String, ttl: Option<u64>) -> Result<()> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let inner = &mut *guard;

        if !inner.values.contains_key(key) && inner.values.len() >= self.max_entries {
            // Expired values go first, then the least recently written one
            inner.values.retain(|_, v| !v.is_expired(now));
            if inner.values.len() >= self.max_entries {
                let oldest = inner
                    .values
                    .iter()
                    .min_by_key(|(_, v)| v.written_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(oldest) => {
                        debug!("Memory store full, evicting {}", oldest);
                        inner.values.remove(&oldest);
                        inner.stats.record_eviction();
                    }
                    None => {
                        return Err(ConsistencyError::Backend(
                            "memory store has zero capacity".to_string(),
                        ))
                    }
                }
            }
        }

        inner
            .values
            .insert(key.to_string(), StoredValue::new(value, now, ttl));
        inner.stats.record_write();
        let total = inner.values.len();
        inner.stats.set_total_entries(total);
        Ok(())
    }
}
