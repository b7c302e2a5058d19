//! Two-Tier Cache Module
//!
//! Read-through / write-through cache over an authoritative remote store,
//! with a [`LocalStore`] in front as a bounded-lifetime accelerator.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::stats::StatsCounters;
use crate::cache::{cap_local_ttl, CacheStats, Expiration, LocalStore};
use crate::error::{CacheError, Result};
use crate::remote::{RemoteStore, RemoteTtl};

// == Two-Tier Cache ==
/// Local tier plus remote store.
///
/// The remote store is the value of record. Writes go remote first and only
/// reach the local tier once the remote write succeeded; local copies are
/// always given a capped lifetime (see [`cap_local_ttl`]). Nothing here
/// retries: a failed remote call is returned as is. For a deadline, wrap the
/// call in `tokio::time::timeout`; dropping the future cancels it.
#[derive(Clone)]
pub struct TwoTierCache {
    local: LocalStore,
    remote: Arc<dyn RemoteStore>,
    stats: Arc<StatsCounters>,
}

impl TwoTierCache {
    // == Constructor ==
    pub fn new(local: LocalStore, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            local,
            remote,
            stats: Arc::new(StatsCounters::default()),
        }
    }

    // == Set ==
    /// Writes `value` remotely with `remote_ttl`, then locally with the
    /// capped TTL.
    ///
    /// A zero `remote_ttl` stores the remote key without expiry and gives the
    /// local copy the local default lifetime. If the remote write fails the
    /// local tier is left untouched.
    pub async fn set(&self, key: &str, value: &str, remote_ttl: Duration) -> Result<()> {
        let ttl = (!remote_ttl.is_zero()).then_some(remote_ttl);
        self.remote.set(key, value, ttl).await?;

        let local_ttl = cap_local_ttl(remote_ttl);
        self.local.set(key, value, Expiration::from(local_ttl));
        debug!(
            key = %key,
            remote_ttl_s = remote_ttl.as_secs(),
            local_ttl_s = local_ttl.as_secs(),
            "cache set"
        );
        Ok(())
    }

    // == Get ==
    /// Reads from the local tier, falling back to the remote store.
    ///
    /// A local hit never touches the remote store. On a remote hit the key's
    /// remaining remote TTL is fetched and, when positive, the value is copied
    /// locally with the capped TTL. Keys without a remote expiry are not
    /// copied. A remote miss is [`CacheError::NotFound`].
    pub async fn get(&self, key: &str) -> Result<String> {
        if let Some(value) = self.local.get(key) {
            self.stats.record_local_hit();
            debug!(key = %key, "cache hit (local)");
            return Ok(value);
        }

        let value = match self.remote.get(key).await? {
            Some(value) => value,
            None => {
                self.stats.record_miss();
                debug!(key = %key, "cache miss");
                return Err(CacheError::NotFound(key.to_string()));
            }
        };
        self.stats.record_remote_hit();

        match self.remote.ttl(key).await {
            Ok(RemoteTtl::Expires(remaining)) if !remaining.is_zero() => {
                let local_ttl = cap_local_ttl(remaining);
                self.local.set(key, value.as_str(), Expiration::After(local_ttl));
                debug!(
                    key = %key,
                    local_ttl_s = local_ttl.as_secs(),
                    "cache hit (remote), promoted"
                );
            }
            Ok(ttl) => debug!(key = %key, ?ttl, "cache hit (remote), not promoted"),
            Err(e) => warn!(key = %key, error = %e, "remote TTL lookup failed, not promoted"),
        }

        Ok(value)
    }

    // == Delete ==
    /// Removes `key` from both tiers, reporting only the remote failure.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.local.delete(key);
        self.remote.del(key).await?;
        debug!(key = %key, "cache delete");
        Ok(())
    }

    // == Flush ==
    /// Drops every local copy. The remote store is not touched.
    pub fn flush(&self) {
        self.local.flush();
        debug!("local tier flushed");
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.local.evictions(), self.local.item_count())
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }
}
