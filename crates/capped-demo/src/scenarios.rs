//! Demo scenarios

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use capped_core::{ManualClock, PeerId};
use capped_event::{CappedEvent, CappedEventConfig, OverflowEvent};
use capped_gossip::{StreamMode, StreamOptions, link};
use capped_logging::PeerContextGuard;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, info_span};

/// Key every scenario pushes to
pub const DEMO_KEY: &str = "event1";

/// Outcome of the overflow scenario
#[derive(Debug, Clone, Serialize)]
pub struct OverflowReport {
    pub peer: String,
    pub warning_line: usize,
    pub pushed: usize,
    /// Length reported by each notification, in order
    pub notifications: Vec<usize>,
    pub final_length: usize,
}

/// Outcome of the replication scenario
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationReport {
    pub origin: String,
    pub replica: String,
    pub replica_warning_line: usize,
    pub pushed: usize,
    pub origin_length: usize,
    pub replica_length: usize,
    /// Notifications fired on the receiving side
    pub replica_notifications: Vec<usize>,
    pub latest_value_matches: bool,
}

/// Outcome of the prune scenario
#[derive(Debug, Clone, Serialize)]
pub struct PruneReport {
    pub pushed: usize,
    pub interval_ms: i64,
    pub age_ms: i64,
    pub after_prune_before: usize,
    pub after_prune_to: usize,
    pub latest_value: Option<usize>,
}

/// Shared list of notification lengths
#[derive(Clone, Default)]
struct Collector(Arc<Mutex<Vec<usize>>>);

impl Collector {
    fn push(&self, length: usize) {
        self.0.lock().push(length);
    }

    fn take(&self) -> Vec<usize> {
        std::mem::take(&mut *self.0.lock())
    }
}

fn peer(name: &str) -> anyhow::Result<PeerId> {
    PeerId::new(name).with_context(|| format!("invalid peer name {name:?}"))
}

/// Push `total` values into one log and record every overflow notification
pub fn run_overflow(config: CappedEventConfig<PeerId>, total: usize) -> anyhow::Result<OverflowReport> {
    let _peer = PeerContextGuard::new(&config.id);
    let _span = info_span!("overflow_scenario", total).entered();

    let event: CappedEvent<PeerId, u64> = CappedEvent::new(config)?;
    let notifications = Collector::default();
    let sink = notifications.clone();
    event.on_overflow(move |overflow: &OverflowEvent| sink.push(overflow.length));

    for i in 0..total {
        event.push(DEMO_KEY, i as u64)?;
    }

    let report = OverflowReport {
        peer: event.id().to_string(),
        warning_line: event.warning_line(),
        pushed: total,
        notifications: notifications.take(),
        final_length: event.length_by_event(DEMO_KEY)?,
    };
    info!(notifications = report.notifications.len(), "overflow scenario finished");
    Ok(report)
}

/// Link an origin to a replica, push on the origin, wait for the replica
pub async fn run_replication(
    origin: CappedEventConfig<PeerId>,
    replica_name: &str,
    replica_warning_line: usize,
    total: usize,
    mode: StreamMode,
) -> anyhow::Result<ReplicationReport> {
    let a: CappedEvent<PeerId, u64> = CappedEvent::new(origin)?;
    let b: CappedEvent<PeerId, u64> = CappedEvent::new(
        CappedEventConfig::new(peer(replica_name)?).with_warning_line(replica_warning_line),
    )?;

    let notifications = Collector::default();
    let sink = notifications.clone();
    b.on_overflow(move |overflow: &OverflowEvent| sink.push(overflow.length));

    let a_name = format!("{}->{}", a.id(), b.id());
    let b_name = format!("{}->{}", b.id(), a.id());
    let link = link(
        a.create_stream(StreamOptions::new(a_name).with_mode(mode)),
        b.create_stream(StreamOptions::new(b_name)),
    );

    {
        let _peer = PeerContextGuard::new(a.id());
        for i in 0..total {
            a.push(DEMO_KEY, i as u64)?;
        }
    }

    let expected = if mode.sends() { total } else { 0 };
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while b.length_by_event(DEMO_KEY).unwrap_or(0) < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    if drained.is_err() {
        bail!(
            "replica saw {} of {} records before the deadline",
            b.length_by_event(DEMO_KEY)?,
            expected
        );
    }
    // Let notifications for the last merge land
    tokio::time::sleep(Duration::from_millis(20)).await;
    link.close();

    Ok(ReplicationReport {
        origin: a.id().to_string(),
        replica: b.id().to_string(),
        replica_warning_line: b.warning_line(),
        pushed: total,
        origin_length: a.length_by_event(DEMO_KEY)?,
        replica_length: b.length_by_event(DEMO_KEY)?,
        replica_notifications: notifications.take(),
        latest_value_matches: a.latest_value_by_event(DEMO_KEY)? == b.latest_value_by_event(DEMO_KEY)?,
    })
}

/// Push on a simulated clock, then prune by age and by count
pub fn run_prune(
    config: CappedEventConfig<PeerId>,
    total: usize,
    interval_ms: i64,
    age_ms: i64,
    keep: usize,
) -> anyhow::Result<PruneReport> {
    let _peer = PeerContextGuard::new(&config.id);
    let clock = Arc::new(ManualClock::new(0));
    let event: CappedEvent<PeerId, usize> = CappedEvent::with_clock(config, clock.clone())?;

    for i in 0..total {
        event.push(DEMO_KEY, i)?;
        clock.advance(interval_ms);
    }

    event.prune_before(age_ms, DEMO_KEY)?;
    let after_prune_before = event.length_by_event(DEMO_KEY)?;
    let after_prune_to = event.prune_to(keep, DEMO_KEY)?;

    Ok(PruneReport {
        pushed: total,
        interval_ms,
        age_ms,
        after_prune_before,
        after_prune_to,
        latest_value: event.latest_value_by_event(DEMO_KEY)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, warning_line: usize) -> CappedEventConfig<PeerId> {
        CappedEventConfig::new(PeerId::new(name).unwrap()).with_warning_line(warning_line)
    }

    #[test]
    fn test_overflow_scenario() {
        let report = run_overflow(config("A", 5), 9).unwrap();
        assert_eq!(report.notifications, vec![6, 7, 8, 9]);
        assert_eq!(report.final_length, 9);
    }

    #[tokio::test]
    async fn test_replication_scenario() {
        let report = run_replication(config("A", 1000), "B", 5, 9, StreamMode::Duplex)
            .await
            .unwrap();
        assert_eq!(report.replica_length, 9);
        assert_eq!(report.replica_notifications.len(), 4);
        assert!(report.latest_value_matches);
    }

    #[tokio::test]
    async fn test_write_only_origin_sends_nothing() {
        let report = run_replication(config("A", 1000), "B", 5, 9, StreamMode::WriteOnly)
            .await
            .unwrap();
        assert_eq!(report.replica_length, 0);
        assert!(report.replica_notifications.is_empty());
    }

    #[test]
    fn test_prune_scenario() {
        let report = run_prune(config("A", 1000), 10, 21, 100, 1).unwrap();
        assert_eq!(report.after_prune_before, 5);
        assert_eq!(report.after_prune_to, 1);
        assert_eq!(report.latest_value, Some(9));
    }

    #[test]
    fn test_reports_serialize() {
        let report = run_overflow(config("A", 2), 3).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["peer"], "A");
        assert_eq!(json["notifications"], serde_json::json!([3]));
    }
}
