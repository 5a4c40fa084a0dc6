//! API Handlers
//!
//! HTTP request handlers for each observer endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use tracing::debug;

use crate::cache::{MemoryStore, SessionRegistry};
use crate::config::{Config, ConfigResolver, ConsistencySettings};
use crate::error::{ConsistencyError, Result};
use crate::models::{
    DeletedRequest, DeletedResponse, HealthResponse, RecentKeysResponse, StatsResponse,
    WrittenRequest, WrittenResponse,
};
use crate::record::{Record, RecordType};
use crate::tracker::RecencyTracker;

/// Header carrying the caller's session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub tracker: RecencyTracker,
    /// Backing store of the `"default"` cache
    pub store: Arc<MemoryStore>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(settings: &ConsistencySettings, store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let tracker = RecencyTracker::standard(ConfigResolver::new(settings), store.clone());
        Self::with_tracker(tracker, store)
    }

    /// State around an already built tracker whose `"default"` cache uses `store`.
    ///
    /// Sessions idle past the tracker's longest retention window expire.
    pub fn with_tracker(tracker: RecencyTracker, store: Arc<MemoryStore>) -> Self {
        let sessions = SessionRegistry::with_clock(tracker.max_cache_time(), tracker.clock());
        Self {
            tracker,
            store,
            sessions: Arc::new(sessions),
        }
    }

    /// Creates a new AppState from configuration and a loaded policy.
    pub fn from_config(config: &Config, settings: &ConsistencySettings) -> Self {
        Self::new(settings, MemoryStore::new(config.max_entries))
    }

    /// The tracker, bound to the caller's session when one is named.
    ///
    /// Only recorded writes (`create`) open a session. Any other call naming
    /// an unknown or expired session sees the detached session cache, which
    /// holds nothing to read or forget.
    fn tracker_for(&self, headers: &HeaderMap, create: bool) -> Result<RecencyTracker> {
        let Some(value) = headers.get(SESSION_HEADER) else {
            return Ok(self.tracker.clone());
        };
        let id = value
            .to_str()
            .map_err(|_| ConsistencyError::InvalidRequest("Invalid session id".to_string()))?;
        if id.is_empty() {
            return Ok(self.tracker.clone());
        }
        let session = if create {
            Some(self.sessions.get_or_create(id)?)
        } else {
            self.sessions.get(id)?
        };
        Ok(match session {
            Some(session) => self.tracker.with_session(session),
            None => self.tracker.clone(),
        })
    }
}

/// Handler for POST /records/written
pub async fn written_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<WrittenRequest>,
) -> Result<Json<WrittenResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ConsistencyError::InvalidRequest(error_msg));
    }

    let tracker = state.tracker_for(&headers, true)?;
    let tracked = tracker.record(&req.record, req.created)?;
    debug!(
        "Write of {} {} (created: {}, tracked: {})",
        req.record.record_type, req.record.pk, req.created, tracked
    );

    Ok(Json(WrittenResponse {
        record_type: req.record.record_type(),
        pk: req.record.primary_key(),
        tracked,
    }))
}

/// Handler for POST /records/deleted
pub async fn deleted_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DeletedRequest>,
) -> Result<Json<DeletedResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ConsistencyError::InvalidRequest(error_msg));
    }

    let tracker = state.tracker_for(&headers, false)?;
    tracker.forget(&req.record)?;

    Ok(Json(DeletedResponse {
        record_type: req.record.record_type(),
        pk: req.record.primary_key(),
    }))
}

/// Handler for GET /records/:record_type/recent
pub async fn recent_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(record_type): Path<String>,
) -> Result<Json<RecentKeysResponse>> {
    let record_type = RecordType::new(record_type);
    let tracker = state.tracker_for(&headers, false)?;
    let keys = tracker.recent_keys(&record_type)?.into_iter().collect();

    Ok(Json(RecentKeysResponse { record_type, keys }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let store = state.store.stats()?;
    Ok(Json(StatsResponse::new(
        state.tracker.stats(),
        store,
        state.sessions.len(),
    )))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Document, PrimaryKey};
    use axum::http::HeaderValue;

    fn state() -> AppState {
        AppState::new(&ConsistencySettings::default(), MemoryStore::new(100))
    }

    fn written(pk: i64, created: bool) -> WrittenRequest {
        WrittenRequest {
            record: Document::new("shop.order", pk),
            created,
        }
    }

    #[tokio::test]
    async fn test_written_then_recent() {
        let state = state();

        let response = written_handler(State(state.clone()), HeaderMap::new(), Json(written(1, true)))
            .await
            .unwrap();
        assert!(response.tracked);

        let response = recent_handler(
            State(state),
            HeaderMap::new(),
            Path("shop.order".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(response.keys, vec![PrimaryKey::Int(1)]);
    }

    #[tokio::test]
    async fn test_update_not_tracked_by_default() {
        let response = written_handler(State(state()), HeaderMap::new(), Json(written(1, false)))
            .await
            .unwrap();
        assert!(!response.tracked);
    }

    #[tokio::test]
    async fn test_deleted_handler() {
        let state = state();
        written_handler(State(state.clone()), HeaderMap::new(), Json(written(1, true)))
            .await
            .unwrap();

        let req = DeletedRequest {
            record: Document::new("shop.order", 1),
        };
        deleted_handler(State(state.clone()), HeaderMap::new(), Json(req))
            .await
            .unwrap();

        let response = recent_handler(
            State(state),
            HeaderMap::new(),
            Path("shop.order".to_string()),
        )
        .await
        .unwrap();
        assert!(response.keys.is_empty());
    }

    #[tokio::test]
    async fn test_session_header_creates_session() {
        let state = state();
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("alice"));

        written_handler(State(state.clone()), headers, Json(written(1, true)))
            .await
            .unwrap();

        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_recent_with_unknown_session_creates_nothing() {
        let state = state();
        for i in 0..50 {
            let mut headers = HeaderMap::new();
            headers.insert(SESSION_HEADER, HeaderValue::from_str(&format!("reader-{}", i)).unwrap());
            let response = recent_handler(
                State(state.clone()),
                headers,
                Path("shop.order".to_string()),
            )
            .await
            .unwrap();
            assert!(response.keys.is_empty());
        }

        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = state();
        written_handler(State(state.clone()), HeaderMap::new(), Json(written(1, true)))
            .await
            .unwrap();

        let response = stats_handler(State(state)).await.unwrap();
        assert_eq!(response.tracker.recorded, 1);
        assert_eq!(response.store.writes, 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_written_invalid_request() {
        let req = WrittenRequest {
            record: Document::new("", 1),
            created: true,
        };
        let result = written_handler(State(state()), HeaderMap::new(), Json(req)).await;
        assert!(matches!(result, Err(ConsistencyError::InvalidRequest(_))));
    }
}
