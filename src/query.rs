//! Query Consistency Augmenter
//!
//! Widens a query with recently written keys and re-validates every
//! candidate with strongly consistent point lookups.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::record::{Document, PrimaryKey, Record, RecordType};
use crate::tracker::RecencyTracker;

/// A filter over records of one type.
pub trait RecordQuery {
    type Record: Record;

    fn record_type(&self) -> RecordType;

    /// True if the record currently satisfies the filter.
    fn matches(&self, record: &Self::Record) -> bool;
}

/// The host's query execution layer.
pub trait QueryExecutor<R: Record> {
    /// Keys the query returns through the secondary index, which may lag
    /// behind recent writes.
    fn query_keys(&self, query: &dyn RecordQuery<Record = R>) -> Result<Vec<PrimaryKey>>;

    /// Current records among `keys`, by point lookup. Missing keys are skipped.
    fn get_many(&self, record_type: &RecordType, keys: &BTreeSet<PrimaryKey>) -> Result<Vec<R>>;
}

// == Keyed Query ==
/// `base` restricted to an explicit set of primary keys.
#[derive(Debug, Clone)]
pub struct KeyedQuery<Q> {
    base: Q,
    keys: BTreeSet<PrimaryKey>,
}

impl<Q: RecordQuery> KeyedQuery<Q> {
    pub fn new(base: Q, keys: BTreeSet<PrimaryKey>) -> Self {
        Self { base, keys }
    }

    pub fn base(&self) -> &Q {
        &self.base
    }

    pub fn keys(&self) -> &BTreeSet<PrimaryKey> {
        &self.keys
    }

    /// Fetches every candidate by key and keeps those still matching `base`.
    pub fn execute<E>(&self, executor: &E) -> Result<Vec<Q::Record>>
    where
        E: QueryExecutor<Q::Record> + ?Sized,
    {
        if self.keys.is_empty() {
            return Ok(Vec::new());
        }
        let fetched = executor.get_many(&self.base.record_type(), &self.keys)?;
        Ok(fetched.into_iter().filter(|r| self.matches(r)).collect())
    }
}

impl<Q: RecordQuery> RecordQuery for KeyedQuery<Q> {
    type Record = Q::Record;

    fn record_type(&self) -> RecordType {
        self.base.record_type()
    }

    fn matches(&self, record: &Self::Record) -> bool {
        self.keys.contains(&record.primary_key()) && self.base.matches(record)
    }
}

// == Augmenter ==
#[derive(Clone)]
pub struct ConsistencyAugmenter {
    tracker: RecencyTracker,
}

impl ConsistencyAugmenter {
    pub fn new(tracker: RecencyTracker) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &RecencyTracker {
        &self.tracker
    }

    /// Rewrites `base` as "current records whose key is in what `base`
    /// returns now, or was recently written, and that still match `base`".
    ///
    /// Never adds a record failing `base`'s filter. Records written longer
    /// than `cache_time` ago and still missing from the index stay missing.
    pub fn strengthen<Q, E>(&self, executor: &E, base: Q) -> Result<KeyedQuery<Q>>
    where
        Q: RecordQuery,
        E: QueryExecutor<Q::Record> + ?Sized,
    {
        let known = executor.query_keys(&base)?;
        let recent = self.tracker.recent_keys(&base.record_type())?;
        let known_count = known.len();

        let mut candidates: BTreeSet<PrimaryKey> = known.into_iter().collect();
        candidates.extend(recent);
        debug!(
            "{}: {} indexed keys, {} candidates",
            base.record_type(),
            known_count,
            candidates.len()
        );
        Ok(KeyedQuery::new(base, candidates))
    }

    /// Only the recently written records that match `base`.
    ///
    /// May overlap with what `base` itself returns.
    pub fn recent_matches<Q: RecordQuery>(&self, base: Q) -> Result<KeyedQuery<Q>> {
        let recent = self.tracker.recent_keys(&base.record_type())?;
        Ok(KeyedQuery::new(base, recent))
    }

    /// `strengthen` followed by execution.
    pub fn consistent_results<Q, E>(&self, executor: &E, base: Q) -> Result<Vec<Q::Record>>
    where
        Q: RecordQuery,
        E: QueryExecutor<Q::Record> + ?Sized,
    {
        self.strengthen(executor, base)?.execute(executor)
    }
}

// == Field Query ==
/// Field-equality query over `Document`s. No conditions selects every record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldQuery {
    record_type: RecordType,
    conditions: Map<String, Value>,
}

impl FieldQuery {
    pub fn all(record_type: impl Into<RecordType>) -> Self {
        Self {
            record_type: record_type.into(),
            conditions: Map::new(),
        }
    }

    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.to_string(), value.into());
        self
    }
}

impl RecordQuery for FieldQuery {
    type Record = Document;

    fn record_type(&self) -> RecordType {
        self.record_type.clone()
    }

    fn matches(&self, record: &Document) -> bool {
        record.record_type == self.record_type
            && self
                .conditions
                .iter()
                .all(|(field, expected)| record.field(field).as_ref() == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_query_matches() {
        let doc = Document::new("shop.order", 1).with("status", "A");

        assert!(FieldQuery::all("shop.order").matches(&doc));
        assert!(FieldQuery::all("shop.order").filter("status", "A").matches(&doc));
        assert!(!FieldQuery::all("shop.order").filter("status", "B").matches(&doc));
        assert!(!FieldQuery::all("shop.order").filter("missing", 1).matches(&doc));
        assert!(!FieldQuery::all("shop.item").matches(&doc));
    }

    #[test]
    fn test_keyed_query_conjoins_key_set() {
        let keys: BTreeSet<PrimaryKey> = [PrimaryKey::Int(1)].into_iter().collect();
        let q = KeyedQuery::new(FieldQuery::all("shop.order").filter("status", "A"), keys);

        assert!(q.matches(&Document::new("shop.order", 1).with("status", "A")));
        assert!(!q.matches(&Document::new("shop.order", 2).with("status", "A")));
        assert!(!q.matches(&Document::new("shop.order", 1).with("status", "B")));
    }
}
