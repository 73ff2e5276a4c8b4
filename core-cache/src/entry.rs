//! On-disk entry format.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A cached value together with the time it was stored and its lifetime.
///
/// Serialized as JSON: `{"value": ..., "stored_at": "...", "ttl_seconds": 300}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, stored_at: DateTime<Utc>, ttl_seconds: u64) -> Self {
        Self {
            value,
            stored_at,
            ttl_seconds,
        }
    }

    /// An entry is expired once strictly more than `ttl_seconds` have elapsed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.stored_at, self.ttl_seconds, now)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.stored_at + ttl(self.ttl_seconds)
    }
}

/// Entry metadata without the payload, used by the expiry sweep.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EntryHeader {
    pub stored_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl EntryHeader {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.stored_at, self.ttl_seconds, now)
    }
}

fn ttl(seconds: u64) -> Duration {
    Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX / 1000))
}

fn is_expired(stored_at: DateTime<Utc>, ttl_seconds: u64, now: DateTime<Utc>) -> bool {
    now - stored_at > ttl(ttl_seconds)
}
