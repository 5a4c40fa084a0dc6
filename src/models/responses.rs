//! Response DTOs for the observer API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::StoreStats;
use crate::record::{PrimaryKey, RecordType};
use crate::tracker::TrackerStats;

/// Response body for POST /records/written
#[derive(Debug, Clone, Serialize)]
pub struct WrittenResponse {
    pub record_type: RecordType,
    pub pk: PrimaryKey,
    /// False when policy excluded the record
    pub tracked: bool,
}

/// Response body for POST /records/deleted
#[derive(Debug, Clone, Serialize)]
pub struct DeletedResponse {
    pub record_type: RecordType,
    pub pk: PrimaryKey,
}

/// Response body for GET /records/:record_type/recent
#[derive(Debug, Clone, Serialize)]
pub struct RecentKeysResponse {
    pub record_type: RecordType,
    /// Sorted, deduplicated across caches
    pub keys: Vec<PrimaryKey>,
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub tracker: TrackerStats,
    pub store: StoreStats,
    /// Backing store hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub sessions: usize,
}

impl StatsResponse {
    pub fn new(tracker: TrackerStats, store: StoreStats, sessions: usize) -> Self {
        let hit_rate = store.hit_rate();
        Self {
            tracker,
            store,
            hit_rate,
            sessions,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status ("healthy")
    pub status: String,
    /// Current server timestamp (ISO 8601)
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_response_hit_rate() {
        let mut store = StoreStats::new();
        store.record_hit();
        store.record_miss();
        let response = StatsResponse::new(TrackerStats::default(), store, 0);
        assert_eq!(response.hit_rate, 0.5);
    }

    #[test]
    fn test_recent_keys_serialize() {
        let response = RecentKeysResponse {
            record_type: RecordType::new("shop.order"),
            keys: vec![PrimaryKey::Int(1), PrimaryKey::from("x")],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["record_type"], "shop.order");
        assert_eq!(json["keys"], serde_json::json!([1, "x"]));
    }

    #[test]
    fn test_health_response() {
        let response = HealthResponse::healthy();
        assert_eq!(response.status, "healthy");
        assert!(!response.timestamp.is_empty());
    }

    #[test]
    fn test_error_response() {
        let response = ErrorResponse::new("boom");
        assert_eq!(response.error, "boom");
    }
}
