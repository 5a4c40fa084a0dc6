//! Stored Value Module
//!
//! A single value held by the in-process backing store.

use chrono::{DateTime, Duration, Utc};

// == Stored Value ==
/// A value with its write time and optional expiry.
#[derive(Debug, Clone)]
pub struct StoredValue {
    pub value: String,
    pub written_at: DateTime<Utc>,
    /// None = no expiration
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    pub fn new(value: String, now: DateTime<Utc>, ttl_seconds: Option<u64>) -> Self {
        let expires_at = ttl_seconds.and_then(|ttl| {
            let secs = i64::try_from(ttl).ok()?;
            Duration::try_seconds(secs).and_then(|d| now.checked_add_signed(d))
        });

        Self {
            value,
            written_at: now,
            expires_at,
        }
    }

    /// Expired once `now` reaches the expiration time.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }
}
