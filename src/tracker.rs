//! Recency Tracker
//!
//! Records primary keys of records written within the retention window,
//! forgets them on delete, and reports the live set per record type.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheRegistry, KeyValueStore, RecentKeyCache, Session};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigResolver, ModelConfig};
use crate::error::Result;
use crate::record::{matches_any, PrimaryKey, Record, RecordType};

/// Lifecycle notifications from the host persistence layer.
///
/// Call `on_saved` after every successful create/update and `on_deleted`
/// after every successful delete, synchronously.
pub trait WriteObserver: Send + Sync {
    fn on_saved(&self, record: &dyn Record, created: bool) -> Result<()>;

    fn on_deleted(&self, record: &dyn Record) -> Result<()>;
}

#[derive(Debug, Default)]
struct Counters {
    recorded: AtomicU64,
    forgotten: AtomicU64,
    skipped: AtomicU64,
    writes_skipped: AtomicU64,
}

// == Tracker Stats ==
/// Snapshot of tracker activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackerStats {
    /// Keys recorded (once per call, however many caches)
    pub recorded: u64,
    /// Delete notifications that reached the caches
    pub forgotten: u64,
    /// Calls short-circuited by policy
    pub skipped: u64,
    /// Cache writes avoided because the namespace was unchanged
    pub writes_skipped: u64,
}

// == Recency Tracker ==
/// Owns every tracked key. Cheap to clone; clones share caches and counters.
#[derive(Clone)]
pub struct RecencyTracker {
    resolver: Arc<ConfigResolver>,
    caches: CacheRegistry,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
}

impl RecencyTracker {
    pub fn new(resolver: ConfigResolver, caches: CacheRegistry) -> Self {
        Self::with_clock(resolver, caches, Arc::new(SystemClock))
    }

    pub fn with_clock(resolver: ConfigResolver, caches: CacheRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: Arc::new(resolver),
            caches,
            clock,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Tracker with the standard caches over a single backing store.
    pub fn standard(resolver: ConfigResolver, store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(resolver, CacheRegistry::standard(store))
    }

    /// A view of this tracker whose `"session"` cache is bound to `session`.
    pub fn with_session(&self, session: Arc<Session>) -> Self {
        Self {
            caches: self.caches.with_session(session),
            ..self.clone()
        }
    }

    pub fn config_for(&self, record_type: &RecordType) -> Arc<ModelConfig> {
        self.resolver.resolve(record_type)
    }

    /// Longest retention window across all record types, in seconds.
    pub fn max_cache_time(&self) -> u64 {
        self.resolver.max_cache_time()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    // == Record ==
    /// Tracks the record after a create (`was_created`) or an update.
    ///
    /// Returns true if the key was written to the configured caches.
    pub fn record(&self, record: &dyn Record, was_created: bool) -> Result<bool> {
        let record_type = record.record_type();
        let config = self.resolver.resolve(&record_type);

        let enabled = if was_created {
            config.cache_on_creation
        } else {
            config.cache_on_modification
        };
        if !enabled || !self.passes_filter(record, &config)? {
            debug!("Not tracking {} {}", record_type, record.primary_key());
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }

        let caches = self.caches.resolve(&config.caches)?;
        let namespace = record_type.namespace_key();
        let pk = record.primary_key();
        let now = self.clock.now();
        for cache in &caches {
            cache.add(&namespace, &pk, &config, now)?;
        }

        self.counters.recorded.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    // == Forget ==
    /// Removes the record's key after a delete.
    pub fn forget(&self, record: &dyn Record) -> Result<()> {
        let record_type = record.record_type();
        let config = self.resolver.resolve(&record_type);

        // Records this policy could never have tracked need no cache roundtrip
        if !config.tracks_anything() || !self.passes_filter(record, &config)? {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let caches = self.caches.resolve(&config.caches)?;
        let namespace = record_type.namespace_key();
        let pk = record.primary_key();
        let now = self.clock.now();
        for cache in &caches {
            if !cache.remove(&namespace, &pk, &config, now)? {
                self.counters.writes_skipped.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.counters.forgotten.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    // == Recent Keys ==
    /// Union of the live keys every configured cache holds for the type.
    pub fn recent_keys(&self, record_type: &RecordType) -> Result<BTreeSet<PrimaryKey>> {
        let config = self.resolver.resolve(record_type);
        let caches: Vec<Arc<dyn RecentKeyCache>> = self.caches.resolve(&config.caches)?;
        let namespace = record_type.namespace_key();
        let now = self.clock.now();

        let mut keys = BTreeSet::new();
        for cache in &caches {
            keys.extend(cache.get_pks(&namespace, &config, now)?);
        }
        Ok(keys)
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            recorded: self.counters.recorded.load(Ordering::Relaxed),
            forgotten: self.counters.forgotten.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            writes_skipped: self.counters.writes_skipped.load(Ordering::Relaxed),
        }
    }

    fn passes_filter(&self, record: &dyn Record, config: &ModelConfig) -> Result<bool> {
        if config.only_cache_matching.is_empty() {
            return Ok(true);
        }
        matches_any(record, &config.only_cache_matching)
    }
}

impl WriteObserver for RecencyTracker {
    fn on_saved(&self, record: &dyn Record, created: bool) -> Result<()> {
        self.record(record, created).map(|_| ())
    }

    fn on_deleted(&self, record: &dyn Record) -> Result<()> {
        self.forget(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::clock::ManualClock;
    use crate::config::{ConfigOverrides, ConsistencySettings};
    use crate::error::ConsistencyError;
    use crate::record::{Document, Predicate};

    const ORDER: &str = "shop.order";

    fn tracker(settings: ConsistencySettings) -> (RecencyTracker, ManualClock) {
        let clock = ManualClock::default();
        let store = Arc::new(MemoryStore::with_clock(100, Arc::new(clock.clone())));
        let tracker = RecencyTracker::with_clock(
            ConfigResolver::new(&settings),
            CacheRegistry::standard(store),
            Arc::new(clock.clone()),
        );
        (tracker, clock)
    }

    fn order(pk: i64, status: &str) -> Document {
        Document::new(ORDER, pk).with("status", status)
    }

    fn keys(tracker: &RecencyTracker) -> Vec<PrimaryKey> {
        tracker
            .recent_keys(&RecordType::new(ORDER))
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_record_on_creation() {
        let (tracker, _) = tracker(ConsistencySettings::default());
        assert!(tracker.record(&order(1, "A"), true).unwrap());
        assert_eq!(keys(&tracker), vec![PrimaryKey::Int(1)]);
    }

    #[test]
    fn test_modification_ignored_by_default() {
        let (tracker, _) = tracker(ConsistencySettings::default());
        assert!(!tracker.record(&order(1, "A"), false).unwrap());
        assert!(keys(&tracker).is_empty());
        assert_eq!(tracker.stats().skipped, 1);
    }

    #[test]
    fn test_modification_tracked_when_enabled() {
        let settings = ConsistencySettings::default().with_model(
            ORDER,
            ConfigOverrides {
                cache_on_creation: Some(false),
                cache_on_modification: Some(true),
                ..Default::default()
            },
        );
        let (tracker, _) = tracker(settings);

        assert!(!tracker.record(&order(1, "A"), true).unwrap());
        assert!(tracker.record(&order(2, "A"), false).unwrap());
        assert_eq!(keys(&tracker), vec![PrimaryKey::Int(2)]);
    }

    #[test]
    fn test_forget_removes_key() {
        let (tracker, _) = tracker(ConsistencySettings::default());
        tracker.record(&order(1, "A"), true).unwrap();
        tracker.record(&order(2, "A"), true).unwrap();

        tracker.forget(&order(1, "A")).unwrap();

        assert_eq!(keys(&tracker), vec![PrimaryKey::Int(2)]);
        assert_eq!(tracker.stats().forgotten, 1);
    }

    #[test]
    fn test_forget_untracked_key_skips_write() {
        let (tracker, _) = tracker(ConsistencySettings::default());
        tracker.record(&order(1, "A"), true).unwrap();

        tracker.forget(&order(42, "A")).unwrap();

        assert_eq!(keys(&tracker), vec![PrimaryKey::Int(1)]);
        assert_eq!(tracker.stats().writes_skipped, 1);
    }

    #[test]
    fn test_forget_short_circuits_when_disabled() {
        let settings = ConsistencySettings::default().with_defaults(ConfigOverrides {
            cache_on_creation: Some(false),
            // A bogus cache name proves no cache is consulted
            caches: Some(vec!["nonexistent".to_string()]),
            ..Default::default()
        });
        let (tracker, _) = tracker(settings);

        tracker.forget(&order(1, "A")).unwrap();
        assert_eq!(tracker.stats().skipped, 1);
    }

    #[test]
    fn test_expiry_without_intervening_write() {
        let (tracker, clock) = tracker(ConsistencySettings::default());
        tracker.record(&order(1, "A"), true).unwrap();

        clock.advance_secs(60);
        assert_eq!(keys(&tracker), vec![PrimaryKey::Int(1)]);

        clock.advance_secs(1);
        assert!(keys(&tracker).is_empty());
    }

    #[test]
    fn test_only_cache_matching() {
        let settings = ConsistencySettings::from_json(
            r#"{"models": {"shop.order": {"only_cache_matching": [{"status": "A"}, {"status": "B"}]}}}"#,
        )
        .unwrap();
        let (tracker, _) = tracker(settings);

        assert!(tracker.record(&order(1, "A"), true).unwrap());
        assert!(tracker.record(&order(2, "B"), true).unwrap());
        assert!(!tracker.record(&order(3, "C"), true).unwrap());

        assert_eq!(keys(&tracker), vec![PrimaryKey::Int(1), PrimaryKey::Int(2)]);
    }

    #[test]
    fn test_malformed_predicate_aborts() {
        let settings = ConsistencySettings::default()
            .with_model_predicate(ORDER, Predicate::fields([("colour", "red")]));
        let (tracker, _) = tracker(settings);

        let err = tracker.record(&order(1, "A"), true).unwrap_err();
        assert!(matches!(err, ConsistencyError::InvalidPredicate { .. }));
        assert!(tracker.forget(&order(1, "A")).is_err());
    }

    #[test]
    fn test_unknown_cache_aborts_before_writing() {
        let settings = ConsistencySettings::default().with_defaults(ConfigOverrides {
            caches: Some(vec!["default".to_string(), "memcache".to_string()]),
            ..Default::default()
        });
        let (tracker, _) = tracker(settings);

        assert!(matches!(
            tracker.record(&order(1, "A"), true),
            Err(ConsistencyError::UnknownCache(_))
        ));
    }

    #[test]
    fn test_session_cache_union() {
        let settings = ConsistencySettings::default().with_model(
            ORDER,
            ConfigOverrides {
                caches: Some(vec!["session".to_string()]),
                ..Default::default()
            },
        );
        let (tracker, _) = tracker(settings);
        let alice = tracker.with_session(Arc::new(Session::new("alice")));
        let bob = tracker.with_session(Arc::new(Session::new("bob")));

        alice.record(&order(1, "A"), true).unwrap();

        assert_eq!(keys(&alice), vec![PrimaryKey::Int(1)]);
        assert!(keys(&bob).is_empty());
        assert!(keys(&tracker).is_empty());
    }

    #[test]
    fn test_observer_interface() {
        let (tracker, _) = tracker(ConsistencySettings::default());
        let observer: &dyn WriteObserver = &tracker;

        observer.on_saved(&order(1, "A"), true).unwrap();
        assert_eq!(keys(&tracker), vec![PrimaryKey::Int(1)]);

        observer.on_deleted(&order(1, "A")).unwrap();
        assert!(keys(&tracker).is_empty());
    }
}
