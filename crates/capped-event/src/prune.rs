//! Pruning policies
//!
//! Both policies work on one key's log in place and only ever remove the
//! oldest records. They are local housekeeping: nothing here is replicated,
//! and a peer keeps whatever it already merged.

use capped_core::{Millis, PeerIdentity};

use crate::log::EventLog;

/// Remove records older than `age_ms` relative to the newest record
///
/// A record is removed when its timestamp is strictly less than
/// `latest.timestamp - age_ms`. The newest record always survives. Returns
/// the number of records removed.
pub fn prune_before<I: PeerIdentity, V>(log: &mut EventLog<I, V>, age_ms: Millis) -> usize {
    let Some(latest) = log.latest() else {
        return 0;
    };
    let cutoff = latest.timestamp.saturating_sub(age_ms.max(0));

    let stale = log
        .records()
        .partition_point(|record| record.timestamp < cutoff);
    log.drop_oldest(stale)
}

/// Keep only the `max_count` most recently ordered records
///
/// Returns the resulting length, `min(max_count, previous length)`.
pub fn prune_to<I: PeerIdentity, V>(log: &mut EventLog<I, V>, max_count: usize) -> usize {
    let excess = log.len().saturating_sub(max_count);
    log.drop_oldest(excess);
    log.len()
}
