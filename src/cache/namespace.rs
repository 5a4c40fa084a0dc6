//! Namespace Module
//!
//! The per-record-type map of recently written primary keys.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::PrimaryKey;

/// One tracked key and when it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedKey {
    pub pk: PrimaryKey,
    pub recorded_at: DateTime<Utc>,
}

// == Namespace ==
/// Primary key -> recorded_at for one record type.
///
/// Serialized as a list of `TrackedKey` so integer and string keys survive
/// a round trip through JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TrackedKey>", into = "Vec<TrackedKey>")]
pub struct Namespace {
    entries: BTreeMap<PrimaryKey, DateTime<Utc>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a stored value; a missing value is an empty namespace.
    pub fn decode(raw: Option<&str>) -> Result<Self> {
        match raw {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Ok(Self::new()),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Records `pk` at `at`, replacing any earlier timestamp.
    pub fn insert(&mut self, pk: PrimaryKey, at: DateTime<Utc>) {
        self.entries.insert(pk, at);
    }

    /// Returns true if the key was present.
    pub fn remove(&mut self, pk: &PrimaryKey) -> bool {
        self.entries.remove(pk).is_some()
    }

    /// Drops every entry recorded strictly before `now - retention`.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let Some(threshold) = now.checked_sub_signed(retention) else {
            return 0;
        };
        let before = self.entries.len();
        self.entries.retain(|_, recorded_at| *recorded_at >= threshold);
        before - self.entries.len()
    }

    pub fn contains(&self, pk: &PrimaryKey) -> bool {
        self.entries.contains_key(pk)
    }

    pub fn recorded_at(&self, pk: &PrimaryKey) -> Option<DateTime<Utc>> {
        self.entries.get(pk).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PrimaryKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<TrackedKey>> for Namespace {
    fn from(keys: Vec<TrackedKey>) -> Self {
        Self {
            entries: keys.into_iter().map(|k| (k.pk, k.recorded_at)).collect(),
        }
    }
}

impl From<Namespace> for Vec<TrackedKey> {
    fn from(ns: Namespace) -> Self {
        ns.entries
            .into_iter()
            .map(|(pk, recorded_at)| TrackedKey { pk, recorded_at })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_boundary_entry() {
        let now = Utc::now();
        let mut ns = Namespace::new();
        ns.insert(PrimaryKey::Int(1), now - Duration::seconds(60));
        ns.insert(PrimaryKey::Int(2), now - Duration::seconds(61));
        ns.insert(PrimaryKey::Int(3), now);

        let removed = ns.prune(now, Duration::seconds(60));

        assert_eq!(removed, 1);
        assert!(ns.contains(&PrimaryKey::Int(1)));
        assert!(!ns.contains(&PrimaryKey::Int(2)));
        assert!(ns.contains(&PrimaryKey::Int(3)));
    }

    #[test]
    fn test_insert_refreshes_timestamp() {
        let now = Utc::now();
        let mut ns = Namespace::new();
        ns.insert(PrimaryKey::Int(1), now - Duration::seconds(30));
        ns.insert(PrimaryKey::Int(1), now);

        assert_eq!(ns.len(), 1);
        assert_eq!(ns.recorded_at(&PrimaryKey::Int(1)), Some(now));
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let mut ns = Namespace::new();
        assert!(!ns.remove(&PrimaryKey::from("ghost")));
        assert!(ns.is_empty());
    }

    #[test]
    fn test_encoding_preserves_key_kinds() {
        let now = Utc::now();
        let mut ns = Namespace::new();
        ns.insert(PrimaryKey::Int(1), now);
        ns.insert(PrimaryKey::from("1"), now);

        let decoded = Namespace::decode(Some(&ns.encode().unwrap())).unwrap();

        assert_eq!(decoded, ns);
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn test_decode_missing_is_empty() {
        assert!(Namespace::decode(None).unwrap().is_empty());
        assert!(Namespace::decode(Some("{not json")).is_err());
    }
}
