//! Local Sweep Task
//!
//! Background task that periodically evicts expired local entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::store::Inner;
use crate::cache::LocalStore;

/// Handle used to stop a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the sweeper to exit. Consumes the handle, so it can fire once.
    pub fn stop(self) {
        // The task may already be gone if the store was dropped
        let _ = self.stop.send(());
        debug!(finished = self.handle.is_finished(), "Sweeper stop requested");
    }
}

/// Spawns the sweeper for a local store.
///
/// The task only holds a weak reference: it exits on an explicit stop or
/// once every [`LocalStore`] handle has been dropped.
pub(crate) fn spawn_sweep_task(store: Weak<Inner>, interval: Duration) -> SweeperHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting local sweep task");

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(inner) = store.upgrade() else {
                        debug!("Local store dropped, sweep task exiting");
                        break;
                    };

                    let removed = LocalStore::from_inner(inner).delete_expired();
                    if removed > 0 {
                        info!(removed, "Local sweep: removed expired entries");
                    } else {
                        debug!("Local sweep: no expired entries found");
                    }
                }
                _ = &mut stop_rx => {
                    info!("Local sweep task stopped");
                    break;
                }
            }
        }
    });

    SweeperHandle {
        stop: stop_tx,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Expiration;
    use crate::error::CacheError;

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let store = LocalStore::new(Duration::from_secs(300), Duration::from_millis(50));
        store.set("expire_soon", "value", Expiration::After(Duration::from_millis(20)));
        store.set("long_lived", "value", Expiration::After(Duration::from_secs(3600)));

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.item_count(), 1, "Expired entry should have been swept");
        assert!(store.get("long_lived").is_some());
        assert_eq!(store.evictions(), 1);

        store.stop_sweeper().unwrap();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_fail() {
        let store = LocalStore::new(Duration::from_secs(300), Duration::from_millis(50));
        assert!(store.has_sweeper());

        assert!(store.stop_sweeper().is_ok());
        assert!(matches!(store.stop_sweeper(), Err(CacheError::SweeperStopped)));
        assert!(matches!(store.stop_sweeper(), Err(CacheError::SweeperStopped)));
    }

    #[tokio::test]
    async fn test_stopped_sweeper_leaves_entries() {
        let store = LocalStore::new(Duration::from_secs(300), Duration::from_millis(30));
        store.stop_sweeper().unwrap();

        store.set("expire_soon", "value", Expiration::After(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(store.get("expire_soon").is_none());
        assert_eq!(store.item_count(), 1, "No sweep should run after stop");
    }

    #[tokio::test]
    async fn test_task_exits_when_store_dropped() {
        let store = LocalStore::new(Duration::from_secs(300), Duration::from_millis(20));
        let weak = store.downgrade();
        let handle = spawn_sweep_task(weak, Duration::from_millis(20));

        drop(store);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(handle.handle.is_finished(), "Task should exit once the store is gone");
    }
}
