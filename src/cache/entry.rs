//! Cache Entry Module
//!
//! Defines local cache entries with absolute expiration and the expiration
//! modes accepted by the local store.

use std::time::Duration;

use chrono::{DateTime, Utc};

// == Expiration ==
/// How long a local entry should live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Use the store's configured default
    Default,
    /// Never expires
    Never,
    /// Expires after the given duration
    After(Duration),
}

impl From<Duration> for Expiration {
    /// A zero duration selects the store default.
    fn from(ttl: Duration) -> Self {
        if ttl.is_zero() {
            Expiration::Default
        } else {
            Expiration::After(ttl)
        }
    }
}

// == Cache Entry ==
/// A single local entry. Replaced on every write, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The stored value
    pub value: String,
    /// Absolute expiration in Unix nanoseconds, 0 = never
    pub expires_at_nanos: i64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry expiring `ttl` from now, or never when `ttl` is `None`.
    pub fn new(value: String, ttl: Option<Duration>) -> Self {
        let expires_at_nanos = match ttl {
            Some(ttl) => {
                let ttl_nanos = i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX);
                current_timestamp_nanos().saturating_add(ttl_nanos)
            }
            None => 0,
        };

        Self {
            value,
            expires_at_nanos,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has reached its expiration at `now` (Unix nanos).
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at_nanos > 0 && now >= self.expires_at_nanos
    }

    /// Checks whether the entry is past its expiration right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_nanos())
    }

    /// Returns the absolute expiration instant, `None` if the entry never expires.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.expires_at_nanos == 0 {
            None
        } else {
            Some(DateTime::from_timestamp_nanos(self.expires_at_nanos))
        }
    }
}

// == Utility Functions ==
/// Returns the current Unix timestamp in nanoseconds.
pub fn current_timestamp_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
