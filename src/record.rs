//! Record Module
//!
//! Record identity (type and primary key), the `Record` trait the host
//! persistence layer implements, and the predicates that restrict which
//! records get tracked.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use crate::error::{ConsistencyError, Result};

/// Prefix of every namespace key in a backing store.
pub const NAMESPACE_PREFIX: &str = "recently-created-";

// == Record Type ==
/// Stable identifier of a record type, e.g. `"shop.order"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordType(String);

impl RecordType {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of this type's namespace in a backing store.
    pub fn namespace_key(&self) -> String {
        format!("{}{}", NAMESPACE_PREFIX, self.0)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordType {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// == Primary Key ==
/// Unique identifier of a record within its type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Int(i64),
    Str(String),
}

impl PrimaryKey {
    /// The key as a JSON value, for comparison against field predicates.
    pub fn to_value(&self) -> Value {
        match self {
            PrimaryKey::Int(i) => Value::from(*i),
            PrimaryKey::Str(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(i) => write!(f, "{}", i),
            PrimaryKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(i: i64) -> Self {
        PrimaryKey::Int(i)
    }
}

impl From<i32> for PrimaryKey {
    fn from(i: i32) -> Self {
        PrimaryKey::Int(i64::from(i))
    }
}

impl From<&str> for PrimaryKey {
    fn from(s: &str) -> Self {
        PrimaryKey::Str(s.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(s: String) -> Self {
        PrimaryKey::Str(s)
    }
}

// == Record Trait ==
/// A persisted record as seen by the tracker.
pub trait Record {
    fn record_type(&self) -> RecordType;

    fn primary_key(&self) -> PrimaryKey;

    /// Current value of a named field, or `None` if the record has no such field.
    fn field(&self, name: &str) -> Option<Value>;
}

// == Document ==
/// A record whose fields are a JSON object.
///
/// The field name `pk` always resolves to the primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub record_type: RecordType,
    pub pk: PrimaryKey,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(record_type: impl Into<RecordType>, pk: impl Into<PrimaryKey>) -> Self {
        Self {
            record_type: record_type.into(),
            pk: pk.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}

impl Record for Document {
    fn record_type(&self) -> RecordType {
        self.record_type.clone()
    }

    fn primary_key(&self) -> PrimaryKey {
        self.pk.clone()
    }

    fn field(&self, name: &str) -> Option<Value> {
        if name == "pk" {
            return Some(self.pk.to_value());
        }
        self.fields.get(name).cloned()
    }
}

// == Predicate ==
/// Boolean test over a record, used by `only_cache_matching`.
#[derive(Clone)]
pub enum Predicate {
    /// Every listed field equals its expected value.
    Fields(BTreeMap<String, Value>),
    /// Arbitrary test.
    Func(Arc<dyn Fn(&dyn Record) -> bool + Send + Sync>),
}

impl Predicate {
    pub fn fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Predicate::Fields(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&dyn Record) -> bool + Send + Sync + 'static,
    {
        Predicate::Func(Arc::new(f))
    }

    /// Tests the record.
    ///
    /// A field-equality predicate that names a field the record lacks is a
    /// configuration error, reported before any value is compared.
    pub fn matches(&self, record: &dyn Record) -> Result<bool> {
        match self {
            Predicate::Func(f) => Ok(f(record)),
            Predicate::Fields(expected) => {
                let mut actual = Vec::with_capacity(expected.len());
                for field in expected.keys() {
                    match record.field(field) {
                        Some(value) => actual.push(value),
                        None => {
                            let record_type = record.record_type();
                            error!(
                                "Invalid only_cache_matching filter for {}: no field '{}' in {:?}",
                                record_type, field, expected
                            );
                            return Err(ConsistencyError::InvalidPredicate {
                                record_type: record_type.to_string(),
                                field: field.clone(),
                            });
                        }
                    }
                }
                Ok(expected.values().zip(actual.iter()).all(|(e, a)| e == a))
            }
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Fields(map) => f.debug_tuple("Fields").field(map).finish(),
            Predicate::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, Value>::deserialize(deserializer).map(Predicate::Fields)
    }
}

/// True if the record satisfies at least one predicate.
pub fn matches_any(record: &dyn Record, predicates: &[Predicate]) -> Result<bool> {
    for predicate in predicates {
        if predicate.matches(record)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(status: &str) -> Document {
        Document::new("shop.order", 7).with("status", status).with("total", 12)
    }

    #[test]
    fn test_namespace_key() {
        let rt = RecordType::new("shop.order");
        assert_eq!(rt.namespace_key(), "recently-created-shop.order");
    }

    #[test]
    fn test_primary_key_serde_untagged() {
        let keys: Vec<PrimaryKey> = serde_json::from_str(r#"[1, "abc"]"#).unwrap();
        assert_eq!(keys, vec![PrimaryKey::Int(1), PrimaryKey::from("abc")]);
    }

    #[test]
    fn test_document_pk_field_alias() {
        let doc = order("A");
        assert_eq!(doc.field("pk"), Some(json!(7)));
        assert_eq!(doc.field("status"), Some(json!("A")));
        assert_eq!(doc.field("missing"), None);
    }

    #[test]
    fn test_fields_predicate_and_semantics() {
        let p = Predicate::fields([("status", json!("A")), ("total", json!(12))]);
        assert!(p.matches(&order("A")).unwrap());

        let p = Predicate::fields([("status", json!("A")), ("total", json!(13))]);
        assert!(!p.matches(&order("A")).unwrap());
    }

    #[test]
    fn test_predicate_list_or_semantics() {
        let preds = vec![
            Predicate::fields([("status", "A")]),
            Predicate::fields([("status", "B")]),
        ];
        assert!(matches_any(&order("A"), &preds).unwrap());
        assert!(matches_any(&order("B"), &preds).unwrap());
        assert!(!matches_any(&order("C"), &preds).unwrap());
    }

    #[test]
    fn test_empty_predicate_list_matches_nothing() {
        assert!(!matches_any(&order("A"), &[]).unwrap());
    }

    #[test]
    fn test_func_predicate() {
        let big = Predicate::func(|r| r.field("total").and_then(|v| v.as_i64()) > Some(10));
        assert!(big.matches(&order("A")).unwrap());
    }

    #[test]
    fn test_missing_field_is_configuration_error() {
        // Mismatch on "status" must not hide the missing "colour" field
        let p = Predicate::fields([("colour", "red"), ("status", "Z")]);
        let err = p.matches(&order("A")).unwrap_err();
        assert!(matches!(
            err,
            ConsistencyError::InvalidPredicate { ref field, .. } if field == "colour"
        ));
    }

    #[test]
    fn test_predicate_deserializes_from_mapping() {
        let preds: Vec<Predicate> = serde_json::from_str(r#"[{"status": "A"}]"#).unwrap();
        assert!(matches_any(&order("A"), &preds).unwrap());
    }
}
