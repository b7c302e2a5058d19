//! Lease Renewal Task
//!
//! Keeps a claimed worker id alive by rewriting its lease key on a fixed
//! period shorter than the lease itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::remote::RemoteStore;
use crate::worker::{LEASE_TTL, LEASE_VALUE};

/// Renewal period. 20 seconds below [`LEASE_TTL`], so one late or missed
/// tick does not lose the lease.
pub const LEASE_RENEW_INTERVAL: Duration = Duration::from_secs(40);

/// Spawns the renewal loop for `lease_key`.
///
/// Each tick unconditionally re-sets the key with a fresh [`LEASE_TTL`].
/// Failures are logged and the loop carries on; if renewals keep failing the
/// lease lapses on its own. The task runs until aborted.
pub fn spawn_lease_renewal(
    remote: Arc<dyn RemoteStore>,
    lease_key: String,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(key = %lease_key, period_s = period.as_secs(), "Starting lease renewal task");

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match remote.set(&lease_key, LEASE_VALUE, Some(LEASE_TTL)).await {
                Ok(()) => debug!(key = %lease_key, "Lease renewed"),
                Err(e) => warn!(key = %lease_key, error = %e, "Lease renewal failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteTtl};

    #[tokio::test(start_paused = true)]
    async fn test_renewal_rewrites_lease() {
        let remote = MemoryRemote::new();
        remote
            .set("lease", LEASE_VALUE, Some(LEASE_TTL))
            .await
            .unwrap();

        let handle = spawn_lease_renewal(
            Arc::new(remote.clone()),
            "lease".to_string(),
            LEASE_RENEW_INTERVAL,
        );

        tokio::time::sleep(Duration::from_secs(41)).await;

        // Renewed at t=40, so 59s remain at t=41
        assert_eq!(
            remote.ttl("lease").await.unwrap(),
            RemoteTtl::Expires(Duration::from_secs(59))
        );
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_survives_remote_outage() {
        let remote = MemoryRemote::new();
        let handle = spawn_lease_renewal(
            Arc::new(remote.clone()),
            "lease".to_string(),
            LEASE_RENEW_INTERVAL,
        );

        remote.set_offline(true);
        tokio::time::sleep(Duration::from_secs(41)).await;
        remote.set_offline(false);
        tokio::time::sleep(Duration::from_secs(40)).await;

        assert!(!handle.is_finished());
        assert_eq!(remote.get("lease").await.unwrap().as_deref(), Some(LEASE_VALUE));
        handle.abort();
    }
}
