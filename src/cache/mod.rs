//! Cache Module
//!
//! Local expiring store and the two-tier cache layered over a remote store.

mod entry;
mod stats;
pub(crate) mod store;
mod ttl;
mod two_tier;


// Re-export public types
pub use entry::{CacheEntry, Expiration};
pub use stats::CacheStats;
pub use store::LocalStore;
pub use ttl::cap_local_ttl;
pub use two_tier::TwoTierCache;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

/// Maximum remote TTL accepted from clients, in seconds (ten years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;
