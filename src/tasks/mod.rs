//! Background Tasks Module
//!
//! Long-running tasks spawned alongside the cache and the worker-id claim.
//!
//! # Tasks
//! - Local sweep: evicts expired local entries at a fixed interval
//! - Lease renewal: keeps a claimed worker id alive in the remote store

mod heartbeat;
mod sweep;

pub use heartbeat::{spawn_lease_renewal, LEASE_RENEW_INTERVAL};
pub use sweep::SweeperHandle;
pub(crate) use sweep::spawn_sweep_task;
