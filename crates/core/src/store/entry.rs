//! The unit of storage for the expiring store.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Error;

/// A value with its write time and time-to-live.
///
/// Serialized with the field names the flat backend persists
/// (`timestamp`, `ttl`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    /// Unix milliseconds at which the entry was (re)written.
    #[serde(rename = "timestamp")]
    pub written_at_ms: i64,
    #[serde(rename = "ttl")]
    pub ttl_ms: i64,
}

impl CacheEntry {
    /// Build an entry written now.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `ttl` rounds to zero milliseconds or
    /// does not fit in an `i64`.
    pub fn new(key: impl Into<String>, value: serde_json::Value, ttl: Duration) -> Result<Self, Error> {
        let ttl_ms = i64::try_from(ttl.as_millis())
            .map_err(|_| Error::InvalidInput(format!("ttl too large: {ttl:?}")))?;
        if ttl_ms <= 0 {
            return Err(Error::InvalidInput("ttl must be greater than 0ms".into()));
        }

        Ok(Self { key: key.into(), value, written_at_ms: now_ms(), ttl_ms })
    }

    /// Expired iff strictly more than `ttl_ms` has elapsed since the write.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms - self.written_at_ms > self.ttl_ms
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
