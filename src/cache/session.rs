//! Session Module
//!
//! Per-user storage for session-scoped recent keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::cache::Namespace;
use crate::clock::{Clock, SystemClock};
use crate::error::{ConsistencyError, Result};

// == Session ==
/// Namespaces visible only to one user session.
#[derive(Debug)]
pub struct Session {
    id: String,
    namespaces: Mutex<HashMap<String, Namespace>>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespaces: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn namespaces(&self) -> Result<MutexGuard<'_, HashMap<String, Namespace>>> {
        self.namespaces
            .lock()
            .map_err(|_| ConsistencyError::Backend(format!("session {} lock poisoned", self.id)))
    }
}

// == Session Registry ==
struct SessionEntry {
    session: Arc<Session>,
    touched_at: DateTime<Utc>,
}

/// Live sessions, keyed by session id.
///
/// A session is touched whenever it is handed out for a write. Every key it
/// holds was recorded at or before that touch, so once it has been idle for
/// longer than the longest retention window it holds nothing live and is
/// dropped.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    idle_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    pub fn new(idle_timeout_secs: u64) -> Self {
        Self::with_clock(idle_timeout_secs, Arc::new(SystemClock))
    }

    pub fn with_clock(idle_timeout_secs: u64, clock: Arc<dyn Clock>) -> Self {
        let secs = i64::try_from(idle_timeout_secs).unwrap_or(i64::MAX);
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout: Duration::seconds(secs.min(i64::MAX / 1000)),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SessionEntry>>> {
        self.sessions
            .lock()
            .map_err(|_| ConsistencyError::Backend("session registry lock poisoned".to_string()))
    }

    fn is_idle(&self, entry: &SessionEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.touched_at) > self.idle_timeout
    }

    /// Returns the live session with this id, if any. Never creates one.
    pub fn get(&self, id: &str) -> Result<Option<Arc<Session>>> {
        let now = self.clock.now();
        let sessions = self.lock()?;
        Ok(sessions
            .get(id)
            .filter(|entry| !self.is_idle(entry, now))
            .map(|entry| entry.session.clone()))
    }

    /// Returns the session with this id, creating it on first use, and marks
    /// it touched.
    pub fn get_or_create(&self, id: &str) -> Result<Arc<Session>> {
        let now = self.clock.now();
        let mut sessions = self.lock()?;

        if let Some(entry) = sessions.get_mut(id) {
            if !self.is_idle(entry, now) {
                entry.touched_at = now;
                return Ok(entry.session.clone());
            }
        }

        let session = Arc::new(Session::new(id));
        sessions.insert(
            id.to_string(),
            SessionEntry {
                session: session.clone(),
                touched_at: now,
            },
        );
        Ok(session)
    }

    /// Drops every idle session and returns how many were removed.
    pub fn expire_idle(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let idle = self.is_idle(entry, now);
            if idle {
                debug!("Session {} idle, dropping", id);
            }
            !idle
        });
        Ok(before - sessions.len())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
