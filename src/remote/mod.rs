//! Remote Store Module
//!
//! The shared key-value store both the two-tier cache and the worker-id
//! claim are built on. Only the handful of primitives they need is exposed.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RemoteError;

mod memory;
mod redis_store;

pub use self::memory::MemoryRemote;
pub use self::redis_store::{RedisOptions, RedisStore};

/// Remaining lifetime of a remote key, as reported by `TTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteTtl {
    /// The key does not exist
    Missing,
    /// The key exists without an expiry
    Persistent,
    /// The key expires after the given duration
    Expires(Duration),
}

impl RemoteTtl {
    /// Maps a raw `TTL` reply (-2 missing, -1 no expiry, seconds otherwise).
    pub fn from_reply(seconds: i64) -> Self {
        match seconds {
            -1 => RemoteTtl::Persistent,
            s if s < 0 => RemoteTtl::Missing,
            s => RemoteTtl::Expires(Duration::from_secs(s as u64)),
        }
    }
}

/// Contract of the remote store.
///
/// Implementations must make `set_nx` atomic: the worker-id claim relies on
/// at most one caller observing success for an absent key.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// `SET key value [EX ttl]`. `None` stores the key without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), RemoteError>;

    /// `SET key value NX [EX ttl]`. Returns `false` when the key already exists.
    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<bool, RemoteError>;

    /// `GET key`.
    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError>;

    /// `TTL key`.
    async fn ttl(&self, key: &str) -> Result<RemoteTtl, RemoteError>;

    /// `DEL key`. Deleting a missing key is not an error.
    async fn del(&self, key: &str) -> Result<(), RemoteError>;

    /// `EXPIRE key ttl`. Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, RemoteError>;
}

/// Whole seconds sent on the wire; sub-second TTLs round up to one second.
pub(crate) fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}
