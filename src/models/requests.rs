//! Request DTOs for the observer API
//!
//! Bodies sent by the host persistence layer after a write or delete.

use serde::Deserialize;

use crate::record::Document;

/// Request body for POST /records/written
#[derive(Debug, Clone, Deserialize)]
pub struct WrittenRequest {
    /// The record as saved
    pub record: Document,
    /// True for a create, false for an update
    #[serde(default)]
    pub created: bool,
}

impl WrittenRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_record(&self.record)
    }
}

/// Request body for POST /records/deleted
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedRequest {
    /// The record as it was before deletion
    pub record: Document,
}

impl DeletedRequest {
    pub fn validate(&self) -> Option<String> {
        validate_record(&self.record)
    }
}

fn validate_record(record: &Document) -> Option<String> {
    if record.record_type.as_str().is_empty() {
        return Some("Record type cannot be empty".to_string());
    }
    None
}
