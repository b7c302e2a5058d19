//! Local Store Module
//!
//! In-process key-value store with per-entry absolute expiration and a
//! background sweeper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::cache::entry::current_timestamp_nanos;
use crate::cache::{CacheEntry, Expiration};
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, SweeperHandle};

// == Local Store ==
/// Local expiring store.
///
/// Cloning yields another handle to the same map. Every lookup and mutation
/// goes through a single reader/writer lock, and readers treat entries past
/// their expiration as absent whether or not the sweeper has evicted them.
#[derive(Debug, Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
pub(crate) struct Inner {
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Resolved default lifetime, `None` = never expires
    default_ttl: Option<Duration>,
    sweeper: Mutex<Option<SweeperHandle>>,
    evictions: AtomicU64,
}

impl LocalStore {
    // == Constructor ==
    /// Creates a store and, when `sweep_interval` is non-zero, starts its sweeper.
    ///
    /// A zero `default_ttl` means entries written with [`Expiration::Default`]
    /// never expire. The sweeper needs a running Tokio runtime; without one
    /// the store still works but expired entries are only hidden, not evicted.
    pub fn new(default_ttl: Duration, sweep_interval: Duration) -> Self {
        let store = Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                default_ttl: (!default_ttl.is_zero()).then_some(default_ttl),
                sweeper: Mutex::new(None),
                evictions: AtomicU64::new(0),
            }),
        };

        if !sweep_interval.is_zero() {
            match tokio::runtime::Handle::try_current() {
                Ok(_) => {
                    let handle = spawn_sweep_task(store.downgrade(), sweep_interval);
                    *store.inner.sweeper.lock() = Some(handle);
                }
                Err(_) => warn!("No Tokio runtime available, local sweeper not started"),
            }
        }

        store
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    fn resolve(&self, expiration: Expiration) -> Option<Duration> {
        match expiration {
            Expiration::Never => None,
            Expiration::After(ttl) if !ttl.is_zero() => Some(ttl),
            Expiration::After(_) | Expiration::Default => self.inner.default_ttl,
        }
    }

    fn live<'a>(entries: &'a HashMap<String, CacheEntry>, key: &str) -> Option<&'a CacheEntry> {
        let now = current_timestamp_nanos();
        entries.get(key).filter(|entry| !entry.is_expired_at(now))
    }

    // == Set ==
    /// Inserts or replaces an entry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, expiration: Expiration) {
        let entry = CacheEntry::new(value.into(), self.resolve(expiration));
        self.inner.entries.write().insert(key.into(), entry);
    }

    /// Inserts or replaces an entry using the default expiration.
    pub fn set_default(&self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, value, Expiration::Default);
    }

    // == Set If Absent ==
    /// Inserts an entry only when no live entry holds the key.
    ///
    /// An entry that is still in the map but already expired counts as absent
    /// and is overwritten.
    pub fn set_if_absent(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        expiration: Expiration,
    ) -> Result<()> {
        let key = key.into();
        let mut entries = self.inner.entries.write();
        if Self::live(&entries, &key).is_some() {
            return Err(CacheError::AlreadyExists(key));
        }
        let entry = CacheEntry::new(value.into(), self.resolve(expiration));
        entries.insert(key, entry);
        Ok(())
    }

    // == Replace ==
    /// Replaces an entry only when a live entry holds the key.
    pub fn replace(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        expiration: Expiration,
    ) -> Result<()> {
        let key = key.into();
        let mut entries = self.inner.entries.write();
        if Self::live(&entries, &key).is_none() {
            return Err(CacheError::DoesNotExist(key));
        }
        let entry = CacheEntry::new(value.into(), self.resolve(expiration));
        entries.insert(key, entry);
        Ok(())
    }

    // == Get ==
    /// Returns the value of a live entry.
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.inner.entries.read();
        Self::live(&entries, key).map(|entry| entry.value.clone())
    }

    /// Returns the value of a live entry with its expiration instant
    /// (`None` when the entry never expires).
    pub fn get_with_expiration(&self, key: &str) -> Option<(String, Option<DateTime<Utc>>)> {
        let entries = self.inner.entries.read();
        Self::live(&entries, key).map(|entry| (entry.value.clone(), entry.expires_at()))
    }

    // == Delete ==
    /// Removes an entry. Missing keys are ignored.
    pub fn delete(&self, key: &str) {
        self.inner.entries.write().remove(key);
    }

    /// Removes every entry.
    pub fn flush(&self) {
        self.inner.entries.write().clear();
    }

    // == Delete Expired ==
    /// Evicts every expired entry, holding the write lock for the whole pass.
    ///
    /// Returns the number of entries removed.
    pub fn delete_expired(&self) -> usize {
        let now = current_timestamp_nanos();
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();
        drop(entries);

        self.inner.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Snapshot of all live entries.
    pub fn items(&self) -> HashMap<String, CacheEntry> {
        let now = current_timestamp_nanos();
        self.inner
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Number of entries held, including expired ones not yet swept.
    pub fn item_count(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Total entries removed by sweep passes.
    pub fn evictions(&self) -> u64 {
        self.inner.evictions.load(Ordering::Relaxed)
    }

    // == Stop Sweeper ==
    /// Stops the background sweeper.
    ///
    /// Succeeds once; later calls, or calls on a store that never started a
    /// sweeper, return [`CacheError::SweeperStopped`].
    pub fn stop_sweeper(&self) -> Result<()> {
        match self.inner.sweeper.lock().take() {
            Some(handle) => {
                handle.stop();
                Ok(())
            }
            None => Err(CacheError::SweeperStopped),
        }
    }

    /// Whether a sweeper is still attached to this store.
    pub fn has_sweeper(&self) -> bool {
        self.inner.sweeper.lock().is_some()
    }
}
