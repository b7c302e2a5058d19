//! Worker Id Module
//!
//! Claims a small integer worker id that no other live process holds, using
//! only the remote store's atomic `SET NX` with expiry. The id seeds per
//! process unique-id generation.
//!
//! Ownership lives entirely in the remote store: a lease key whose presence
//! means "claimed". A process that dies without cleaning up simply stops
//! renewing, and its lease lapses within [`LEASE_TTL`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::WorkerError;
use crate::remote::RemoteStore;
use crate::tasks::{spawn_lease_renewal, LEASE_RENEW_INTERVAL};

/// Lifetime of a lease key between renewals.
pub const LEASE_TTL: Duration = Duration::from_secs(60);

/// Value stored under every lease key.
pub const LEASE_VALUE: &str = "occupied";

/// Default prefix for lease keys.
pub const DEFAULT_PREFIX: &str = "kvcoord:worker";

/// Default width of the id space (ids 0..=63).
pub const DEFAULT_BIT_LENGTH: u8 = 6;

// == Options ==
/// Worker id settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdOptions {
    /// Lease keys are `{prefix}:{id}`
    pub prefix: String,
    /// Width of the id space in bits, 1..=16
    pub bit_length: u8,
    /// Fixed id that bypasses claiming
    pub worker_id: Option<u16>,
}

impl Default for WorkerIdOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            bit_length: DEFAULT_BIT_LENGTH,
            worker_id: None,
        }
    }
}

impl WorkerIdOptions {
    /// Largest claimable id, `2^bit_length - 1`.
    pub fn max_worker_id(&self) -> Result<u16, WorkerError> {
        match self.bit_length {
            1..=16 => Ok(((1u32 << self.bit_length) - 1) as u16),
            other => Err(WorkerError::InvalidBitLength(other)),
        }
    }

    /// Lease key for `id`.
    pub fn lease_key(&self, id: u16) -> String {
        format!("{}:{}", self.prefix, id)
    }

    /// Checks the bit length and that a fixed id fits the space.
    pub fn validate(&self) -> Result<(), WorkerError> {
        let max = self.max_worker_id()?;
        match self.worker_id {
            Some(id) if id > max => Err(WorkerError::OverrideOutOfRange { id, max }),
            _ => Ok(()),
        }
    }
}

// == Worker Lease ==
/// A claimed worker id and its renewal task.
#[derive(Debug)]
pub struct WorkerLease {
    worker_id: u16,
    lease_key: Option<String>,
    renewal: Option<JoinHandle<()>>,
}

impl WorkerLease {
    pub fn worker_id(&self) -> u16 {
        self.worker_id
    }

    /// Remote key backing the claim, `None` for a fixed id.
    pub fn lease_key(&self) -> Option<&str> {
        self.lease_key.as_deref()
    }

    /// Whether a renewal task is attached and still running.
    pub fn is_renewing(&self) -> bool {
        self.renewal
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops renewing. The remote lease is left to lapse, not deleted.
    pub fn stop(mut self) {
        if let Some(handle) = self.renewal.take() {
            handle.abort();
            info!(worker_id = self.worker_id, "Lease renewal stopped");
        }
    }
}

// == Claimer ==
/// Claims worker ids against a shared remote store.
pub struct WorkerIdClaimer {
    remote: Arc<dyn RemoteStore>,
    options: WorkerIdOptions,
    renew_interval: Duration,
}

impl WorkerIdClaimer {
    pub fn new(remote: Arc<dyn RemoteStore>, options: WorkerIdOptions) -> Self {
        Self {
            remote,
            options,
            renew_interval: LEASE_RENEW_INTERVAL,
        }
    }

    pub fn options(&self) -> &WorkerIdOptions {
        &self.options
    }

    /// Probes ids upward from 0 with `SET NX EX 60` and returns the first
    /// one written.
    ///
    /// An id that is already present is skipped. A transport error aborts
    /// the claim, as does running past the top of the id space: both are
    /// startup failures, never retried here.
    pub async fn find_free_id(&self) -> Result<u16, WorkerError> {
        let max = self.options.max_worker_id()?;

        for candidate in 0..=max {
            let key = self.options.lease_key(candidate);
            if self
                .remote
                .set_nx(&key, LEASE_VALUE, Some(LEASE_TTL))
                .await?
            {
                return Ok(candidate);
            }
            warn!(worker_id = candidate, "Worker id is occupied, trying next");
        }

        Err(WorkerError::Exhausted { max })
    }

    /// Obtains this process's worker id.
    ///
    /// With a fixed id configured, returns it without touching the remote
    /// store. Otherwise claims a free id and starts renewing its lease.
    /// Must run inside a Tokio runtime.
    pub async fn claim(&self) -> Result<WorkerLease, WorkerError> {
        self.options.validate()?;

        if let Some(worker_id) = self.options.worker_id {
            info!(worker_id, "Using fixed worker id");
            return Ok(WorkerLease {
                worker_id,
                lease_key: None,
                renewal: None,
            });
        }

        let worker_id = self.find_free_id().await?;
        let lease_key = self.options.lease_key(worker_id);
        let renewal = spawn_lease_renewal(
            Arc::clone(&self.remote),
            lease_key.clone(),
            self.renew_interval,
        );

        info!(worker_id, key = %lease_key, "Worker id claimed");
        Ok(WorkerLease {
            worker_id,
            lease_key: Some(lease_key),
            renewal: Some(renewal),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::remote::{MemoryRemote, RemoteTtl};

    fn claimer(remote: &MemoryRemote, bit_length: u8) -> WorkerIdClaimer {
        WorkerIdClaimer::new(
            Arc::new(remote.clone()),
            WorkerIdOptions {
                prefix: "test:worker".to_string(),
                bit_length,
                worker_id: None,
            },
        )
    }

    async fn hold(remote: &MemoryRemote, id: u16) {
        remote
            .set(&format!("test:worker:{}", id), LEASE_VALUE, Some(LEASE_TTL))
            .await
            .unwrap();
    }

    #[test]
    fn test_max_worker_id() {
        let mut options = WorkerIdOptions::default();
        assert_eq!(options.max_worker_id().unwrap(), 63);

        options.bit_length = 1;
        assert_eq!(options.max_worker_id().unwrap(), 1);
        options.bit_length = 16;
        assert_eq!(options.max_worker_id().unwrap(), u16::MAX);

        options.bit_length = 0;
        assert!(matches!(
            options.max_worker_id(),
            Err(WorkerError::InvalidBitLength(0))
        ));
        options.bit_length = 17;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_override_must_fit_space() {
        let options = WorkerIdOptions {
            bit_length: 3,
            worker_id: Some(8),
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(WorkerError::OverrideOutOfRange { id: 8, max: 7 })
        ));
    }

    #[test]
    fn test_lease_key_format() {
        let options = WorkerIdOptions::default();
        assert_eq!(options.lease_key(5), "kvcoord:worker:5");
    }

    #[tokio::test]
    async fn test_claims_lowest_free_id() {
        let remote = MemoryRemote::new();

        let lease = claimer(&remote, 6).claim().await.unwrap();

        assert_eq!(lease.worker_id(), 0);
        assert_eq!(lease.lease_key(), Some("test:worker:0"));
        assert!(lease.is_renewing());
        lease.stop();
    }

    #[tokio::test]
    async fn test_skips_held_ids() {
        let remote = MemoryRemote::new();
        hold(&remote, 0).await;
        hold(&remote, 1).await;

        let lease = claimer(&remote, 6).claim().await.unwrap();

        assert_eq!(lease.worker_id(), 2);
        lease.stop();
    }

    #[tokio::test]
    async fn test_fills_gap_left_by_lapsed_lease() {
        let remote = MemoryRemote::new();
        hold(&remote, 0).await;
        hold(&remote, 2).await;

        let id = claimer(&remote, 6).find_free_id().await.unwrap();

        assert_eq!(id, 1);
    }

    #[tokio::test]
    async fn test_exhausted_space_fails_without_looping() {
        let remote = MemoryRemote::new();
        for id in 0..=3 {
            hold(&remote, id).await;
        }
        let calls_before = remote.calls();

        let result = claimer(&remote, 2).claim().await;

        assert!(matches!(result, Err(WorkerError::Exhausted { max: 3 })));
        assert_eq!(remote.calls() - calls_before, 4, "one probe per id");
    }

    #[tokio::test]
    async fn test_transport_error_aborts_claim() {
        let remote = MemoryRemote::new();
        remote.set_offline(true);

        let result = claimer(&remote, 6).claim().await;

        assert!(matches!(
            result,
            Err(WorkerError::Remote(RemoteError::Connection(_)))
        ));
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_fixed_id_skips_remote() {
        let remote = MemoryRemote::new();
        let claimer = WorkerIdClaimer::new(
            Arc::new(remote.clone()),
            WorkerIdOptions {
                worker_id: Some(9),
                ..Default::default()
            },
        );

        let lease = claimer.claim().await.unwrap();

        assert_eq!(lease.worker_id(), 9);
        assert!(lease.lease_key().is_none());
        assert!(!lease.is_renewing());
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_claims_get_distinct_ids() {
        let remote = MemoryRemote::new();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let claimer = claimer(&remote, 4);
            tasks.push(tokio::spawn(async move { claimer.claim().await }));
        }

        let mut ids = Vec::new();
        for task in tasks {
            let lease = task.await.unwrap().unwrap();
            ids.push(lease.worker_id());
            lease.stop();
        }
        ids.sort_unstable();

        assert_eq!(ids, (0..8).collect::<Vec<u16>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_keeps_lease_alive() {
        let remote = MemoryRemote::new();
        let lease = claimer(&remote, 6).claim().await.unwrap();
        let key = lease.lease_key().unwrap().to_string();

        // Three renewal cycles, checked every second
        for _ in 0..(3 * 40) {
            tokio::time::sleep(Duration::from_secs(1)).await;
            match remote.ttl(&key).await.unwrap() {
                RemoteTtl::Expires(remaining) => {
                    assert!(remaining >= Duration::from_secs(20), "ttl fell to {:?}", remaining)
                }
                other => panic!("lease lost: {:?}", other),
            }
        }

        lease.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_lease_lapses_and_is_reclaimed() {
        let remote = MemoryRemote::new();
        let lease = claimer(&remote, 6).claim().await.unwrap();
        assert_eq!(lease.worker_id(), 0);

        // One renewal at t=40, then stop
        tokio::time::sleep(Duration::from_secs(45)).await;
        lease.stop();

        // Still held shortly before the last renewal's lease runs out
        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(claimer(&remote, 6).find_free_id().await.unwrap(), 1);

        // Gone within 60 seconds of the renewal at t=40
        tokio::time::sleep(Duration::from_secs(10)).await;
        let reclaimed = claimer(&remote, 6).claim().await.unwrap();
        assert_eq!(reclaimed.worker_id(), 0);
        reclaimed.stop();
    }
}
