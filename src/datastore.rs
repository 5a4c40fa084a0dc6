//! Memory Datastore
//!
//! In-process document store with a secondary index that can fall behind
//! the primary records, reproducing read-after-write gaps. Point lookups
//! always see the latest write.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{ConsistencyError, Result};
use crate::query::{QueryExecutor, RecordQuery};
use crate::record::{Document, PrimaryKey, RecordType};
use crate::tracker::WriteObserver;

type Table = BTreeMap<PrimaryKey, Document>;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<RecordType, Table>,
    index: HashMap<RecordType, Table>,
    lagging: bool,
}

// == Memory Datastore ==
#[derive(Default)]
pub struct MemoryDatastore {
    inner: RwLock<Inner>,
    observers: Vec<Arc<dyn WriteObserver>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifies `observer` after every save and delete.
    pub fn with_observer(mut self, observer: Arc<dyn WriteObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| ConsistencyError::Backend("datastore lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| ConsistencyError::Backend("datastore lock poisoned".to_string()))
    }

    /// Stops index updates; queries keep seeing the current index snapshot.
    pub fn begin_lag(&self) -> Result<()> {
        self.write()?.lagging = true;
        Ok(())
    }

    /// Brings the index up to date and resumes synchronous indexing.
    pub fn catch_up(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.index = inner.records.clone();
        inner.lagging = false;
        Ok(())
    }

    /// Inserts or replaces a document. Returns true if it was created.
    pub fn save(&self, doc: Document) -> Result<bool> {
        let created = {
            let mut inner = self.write()?;
            let lagging = inner.lagging;
            let created = inner
                .records
                .entry(doc.record_type.clone())
                .or_default()
                .insert(doc.pk.clone(), doc.clone())
                .is_none();
            if !lagging {
                inner
                    .index
                    .entry(doc.record_type.clone())
                    .or_default()
                    .insert(doc.pk.clone(), doc.clone());
            }
            created
        };

        debug!("Saved {} {} (created: {})", doc.record_type, doc.pk, created);
        for observer in &self.observers {
            observer.on_saved(&doc, created)?;
        }
        Ok(created)
    }

    /// Deletes a document, returning it if it existed.
    pub fn delete(&self, record_type: &RecordType, pk: &PrimaryKey) -> Result<Option<Document>> {
        let removed = {
            let mut inner = self.write()?;
            let lagging = inner.lagging;
            let removed = inner.records.get_mut(record_type).and_then(|t| t.remove(pk));
            if !lagging {
                if let Some(table) = inner.index.get_mut(record_type) {
                    table.remove(pk);
                }
            }
            removed
        };

        if let Some(doc) = &removed {
            for observer in &self.observers {
                observer.on_deleted(doc)?;
            }
        }
        Ok(removed)
    }

    /// Point lookup.
    pub fn get(&self, record_type: &RecordType, pk: &PrimaryKey) -> Result<Option<Document>> {
        Ok(self
            .read()?
            .records
            .get(record_type)
            .and_then(|t| t.get(pk))
            .cloned())
    }

    /// Runs a query through the (possibly stale) index.
    pub fn query(&self, query: &dyn RecordQuery<Record = Document>) -> Result<Vec<Document>> {
        let inner = self.read()?;
        Ok(inner
            .index
            .get(&query.record_type())
            .map(|t| t.values().filter(|d| query.matches(d)).cloned().collect())
            .unwrap_or_default())
    }
}

impl QueryExecutor<Document> for MemoryDatastore {
    fn query_keys(&self, query: &dyn RecordQuery<Record = Document>) -> Result<Vec<PrimaryKey>> {
        Ok(self.query(query)?.into_iter().map(|d| d.pk).collect())
    }

    fn get_many(
        &self,
        record_type: &RecordType,
        keys: &BTreeSet<PrimaryKey>,
    ) -> Result<Vec<Document>> {
        let inner = self.read()?;
        let Some(table) = inner.records.get(record_type) else {
            return Ok(Vec::new());
        };
        Ok(keys.iter().filter_map(|pk| table.get(pk).cloned()).collect())
    }
}
