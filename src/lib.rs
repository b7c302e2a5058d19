//! kvcoord - Coordination primitives over a shared Redis-compatible store
//!
//! Provides a two-tier (local + remote) cache with capped local lifetimes and
//! a lease-based worker id claim for per-process unique-id generation.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod tasks;
pub mod worker;

pub use api::AppState;
pub use cache::{LocalStore, TwoTierCache};
pub use config::Config;
pub use remote::{MemoryRemote, RedisStore, RemoteStore};
pub use worker::{WorkerIdClaimer, WorkerLease};
