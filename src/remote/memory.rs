//! In-process remote store.
//!
//! Behaves like a single Redis node for the commands in [`RemoteStore`].
//! Deadlines use Tokio's clock, so tests running with a paused clock can
//! drive expiry with `tokio::time::advance` or `sleep`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{RemoteStore, RemoteTtl};
use crate::error::RemoteError;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    deadline: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.deadline.map_or(true, |deadline| now < deadline)
    }
}

#[derive(Debug, Default)]
struct Shared {
    data: Mutex<HashMap<String, Slot>>,
    calls: AtomicU64,
    offline: AtomicBool,
}

/// In-memory [`RemoteStore`]. Clones share the same keyspace, which lets
/// several claimers or caches in one test act as separate processes.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    shared: Arc<Shared>,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands received so far, failed ones included.
    pub fn calls(&self) -> u64 {
        self.shared.calls.load(Ordering::SeqCst)
    }

    /// While offline every command fails with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.shared
            .data
            .lock()
            .values()
            .filter(|slot| slot.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin(&self) -> Result<(), RemoteError> {
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
        if self.shared.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Connection("remote store offline".to_string()));
        }
        Ok(())
    }

    /// Looks up a live slot, dropping the key if its deadline has passed.
    fn live_slot<'a>(
        data: &'a mut HashMap<String, Slot>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut Slot> {
        if data.get(key).is_some_and(|slot| !slot.is_live(now)) {
            data.remove(key);
        }
        data.get_mut(key)
    }

    /// Drops every slot whose deadline has passed.
    fn prune(data: &mut HashMap<String, Slot>, now: Instant) {
        data.retain(|_, slot| slot.is_live(now));
    }

    fn slot(value: &str, ttl: Option<Duration>) -> Slot {
        Slot {
            value: value.to_string(),
            // A deadline past what the clock can represent never arrives
            deadline: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), RemoteError> {
        self.begin()?;
        let mut data = self.shared.data.lock();
        Self::prune(&mut data, Instant::now());
        data.insert(key.to_string(), Self::slot(value, ttl));
        Ok(())
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, RemoteError> {
        self.begin()?;
        let now = Instant::now();
        let mut data = self.shared.data.lock();
        Self::prune(&mut data, now);
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(key.to_string(), Self::slot(value, ttl));
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        self.begin()?;
        let now = Instant::now();
        let mut data = self.shared.data.lock();
        Ok(Self::live_slot(&mut data, key, now).map(|slot| slot.value.clone()))
    }

    async fn ttl(&self, key: &str) -> Result<RemoteTtl, RemoteError> {
        self.begin()?;
        let now = Instant::now();
        let mut data = self.shared.data.lock();
        Ok(match Self::live_slot(&mut data, key, now) {
            None => RemoteTtl::Missing,
            Some(Slot { deadline: None, .. }) => RemoteTtl::Persistent,
            Some(Slot {
                deadline: Some(deadline),
                ..
            }) => RemoteTtl::Expires(deadline.saturating_duration_since(now)),
        })
    }

    async fn del(&self, key: &str) -> Result<(), RemoteError> {
        self.begin()?;
        self.shared.data.lock().remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, RemoteError> {
        self.begin()?;
        let now = Instant::now();
        let mut data = self.shared.data.lock();
        match Self::live_slot(&mut data, key, now) {
            Some(slot) => {
                slot.deadline = now.checked_add(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
