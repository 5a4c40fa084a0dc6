//! Recency Guard - narrows read-after-write gaps on eventually-consistent stores
//!
//! Tracks the primary keys of recently written records per record type and
//! widens queries with them, re-validating every candidate by point lookup.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod datastore;
pub mod error;
pub mod models;
pub mod query;
pub mod record;
pub mod tasks;
pub mod tracker;

pub use api::AppState;
pub use config::{Config, ConfigResolver, ConsistencySettings};
pub use datastore::MemoryDatastore;
pub use error::{ConsistencyError, Result};
pub use query::{ConsistencyAugmenter, FieldQuery, KeyedQuery, QueryExecutor, RecordQuery};
pub use record::{Document, Predicate, PrimaryKey, Record, RecordType};
pub use tasks::spawn_cleanup_task;
pub use tracker::{RecencyTracker, WriteObserver};
