//! Local TTL capping.
//!
//! Local copies always live shorter than their remote counterpart, and never
//! longer than 30 minutes. Keys that double as `SET NX` locks elsewhere must
//! not keep answering locally after the remote lock has lapsed, so the steps
//! below are fixed breakpoints, not a proportional scale-down.

use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

/// Local lifetime for an entry whose remote lifetime is `remote_ttl`.
///
/// | remote TTL | local TTL |
/// |---|---|
/// | >= 35 min | 30 min |
/// | >= 15 min | 10 min |
/// | >= 10 min | 5 min |
/// | >= 5 min | 1 min |
/// | shorter | unchanged |
pub fn cap_local_ttl(remote_ttl: Duration) -> Duration {
    if remote_ttl >= MINUTE * 35 {
        MINUTE * 30
    } else if remote_ttl >= MINUTE * 15 {
        MINUTE * 10
    } else if remote_ttl >= MINUTE * 10 {
        MINUTE * 5
    } else if remote_ttl >= MINUTE * 5 {
        MINUTE
    } else {
        remote_ttl
    }
}
