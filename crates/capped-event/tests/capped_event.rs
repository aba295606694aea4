//! Behaviour of a capped event log
//!
//! 1. **test_get_length**: per-key and total lengths
//! 2. **test_overflow**: local pushes past the warning line
//! 3. **test_overflow_on_remote**: merged pushes trigger the receiver's monitor
//! 4. **test_prune_before**: age-based pruning relative to the newest record
//! 5. **test_prune_to**: count-based pruning
//! 6. **test_latest_value_by_event**: latest value with and without metadata

use std::sync::Arc;
use std::time::Duration;

use capped_core::{ManualClock, PeerId};
use capped_event::{CappedEvent, CappedEventConfig, DEFAULT_WARNING_LINE, OverflowEvent};
use capped_gossip::{link, StreamOptions};
use parking_lot::Mutex;

fn peer(name: &str) -> PeerId {
    PeerId::new(name).expect("valid peer id")
}

fn capped<V: capped_gossip::Payload>(name: &str) -> CappedEvent<PeerId, V> {
    CappedEvent::new(CappedEventConfig::new(peer(name))).expect("valid config")
}

fn capped_with_line<V: capped_gossip::Payload>(name: &str, warning_line: usize) -> CappedEvent<PeerId, V> {
    CappedEvent::new(CappedEventConfig::new(peer(name)).with_warning_line(warning_line))
        .expect("valid config")
}

fn record_overflows<V: capped_gossip::Payload>(event: &CappedEvent<PeerId, V>) -> Arc<Mutex<Vec<OverflowEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    event.on_overflow(move |overflow| sink.lock().push(overflow.clone()));
    seen
}

#[test]
fn test_get_length() {
    let a = capped::<String>("A");
    a.push("event1", "0".to_string()).unwrap();
    a.push("event1", "1".to_string()).unwrap();
    a.push("event2", "0".to_string()).unwrap();

    assert_eq!(a.length_by_event("event1").unwrap(), 2);
    assert_eq!(a.length_by_event("event2").unwrap(), 1);
    assert_eq!(a.length_by_event("event3").unwrap(), 0);
    assert_eq!(a.total_length(), 3);
}

#[test]
fn test_total_is_sum_of_keys() {
    let a = capped::<u32>("A");
    for i in 0..30u32 {
        a.push(&format!("key-{}", i % 7), i).unwrap();
    }
    let sum: usize = a
        .keys()
        .iter()
        .map(|key| a.length_by_event(key).unwrap())
        .sum();
    assert_eq!(a.total_length(), sum);
    assert_eq!(sum, 30);
}

#[test]
fn test_overflow() {
    let total = 9;
    let warning_line = 5;
    let a = capped_with_line::<i64>("A", warning_line);
    let seen = record_overflows(&a);

    for i in 0..total {
        a.push("event1", i as i64).unwrap();
    }

    let seen = seen.lock();
    assert_eq!(seen.len(), total - warning_line);
    for overflow in seen.iter() {
        assert_eq!(overflow.key, "event1");
        assert!(overflow.length >= warning_line);
    }
}

#[test]
fn test_no_overflow_below_line() {
    let a = capped_with_line::<i64>("A", 5);
    let seen = record_overflows(&a);
    for i in 0..5 {
        a.push("event1", i).unwrap();
    }
    for i in 0..4 {
        a.push("event2", i).unwrap();
    }
    assert!(seen.lock().is_empty());
}

#[test]
fn test_overflow_stops_after_prune_below_line() {
    let a = capped_with_line::<i64>("A", 3);
    let seen = record_overflows(&a);
    for i in 0..5 {
        a.push("event1", i).unwrap();
    }
    assert_eq!(seen.lock().len(), 2);

    a.prune_to(1, "event1").unwrap();
    a.push("event1", 5).unwrap();
    a.push("event1", 6).unwrap();
    assert_eq!(seen.lock().len(), 2);

    a.push("event1", 7).unwrap();
    assert_eq!(seen.lock().len(), 3);
}

#[tokio::test]
async fn test_overflow_channel() {
    let a = capped_with_line::<i64>("A", 2);
    let mut overflows = a.overflow_events();

    for i in 0..4 {
        a.push("event1", i).unwrap();
    }

    let first = overflows.recv().await.unwrap();
    let second = overflows.recv().await.unwrap();
    assert_eq!((first.length, second.length), (3, 4));
    assert!(overflows.try_recv().is_err());
}

#[tokio::test]
async fn test_overflow_on_remote() {
    let total = 9;
    let warning_line = 5;
    let a = capped::<i64>("A");
    let b = capped_with_line::<i64>("B", warning_line);

    let _link = link(
        a.create_stream(StreamOptions::new("a->b")),
        b.create_stream(StreamOptions::new("b->a")),
    );

    let mut overflows = b.overflow_events();
    for i in 0..total {
        a.push("event1", i as i64).unwrap();
    }

    let mut received = Vec::new();
    for _ in 0..total - warning_line {
        let overflow = tokio::time::timeout(Duration::from_secs(2), overflows.recv())
            .await
            .expect("overflow before deadline")
            .expect("channel open");
        received.push(overflow);
    }

    for overflow in &received {
        assert_eq!(overflow.key, "event1");
        assert!(overflow.length >= warning_line);
    }
    assert_eq!(b.length_by_event("event1").unwrap(), total);

    // The origin never reached its own (default) line
    assert!(a.warning_line() == DEFAULT_WARNING_LINE);
}

#[test]
fn test_prune_before() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let a: CappedEvent<PeerId, usize> =
        CappedEvent::with_clock(CappedEventConfig::new(peer("A")), clock.clone()).unwrap();

    let interval = 20;
    let total = 10;
    for i in 0..total {
        a.push("event1", i).unwrap();
        if i < total - 1 {
            // Timers never fire exactly on time
            clock.advance(interval + 1);
        }
    }

    let half = total / 2;
    let before = ((total - half) as i64) * interval;
    a.prune_before(before, "event1").unwrap();
    assert_eq!(a.length_by_event("event1").unwrap(), total - half);
    assert_eq!(a.latest_value_by_event("event1").unwrap(), Some(total - 1));
}

#[test]
fn test_prune_before_unknown_key() {
    let a = capped::<i64>("A");
    a.prune_before(100, "nothing").unwrap();
    assert_eq!(a.total_length(), 0);
}

#[test]
fn test_prune_to() {
    let a = capped::<i64>("A");
    for i in 0..10 {
        a.push("event1", i).unwrap();
    }
    let remaining = a.prune_to(1, "event1").unwrap();
    assert_eq!(remaining, 1);
    assert_eq!(a.length_by_event("event1").unwrap(), 1);
    assert_eq!(a.latest_value_by_event("event1").unwrap(), Some(9));

    assert_eq!(a.prune_to(5, "event1").unwrap(), 1);
    assert_eq!(a.prune_to(3, "unknown").unwrap(), 0);
}

#[test]
fn test_latest_value_by_event() {
    let a = capped::<i64>("A");
    assert_eq!(a.latest_value_by_event("event1").unwrap(), None);

    a.push_at("event1", 1, 2).unwrap();
    assert_eq!(a.latest_value_by_event("event1").unwrap(), Some(1));

    let update = a.latest_update_by_event("event1").unwrap().unwrap();
    assert_eq!(update.entry, ("event1".to_string(), 1, 2));
    assert_eq!(update.index, 0);
    assert_eq!(update.source.as_str(), "A");

    a.prune_to(0, "event1").unwrap();
    assert_eq!(a.latest_value_by_event("event1").unwrap(), None);
    assert!(a.latest_update_by_event("event1").unwrap().is_none());
}

#[test]
fn test_latest_follows_timestamp_order() {
    let a = capped::<String>("A");
    a.push_at("event1", "late".to_string(), 200).unwrap();
    a.push_at("event1", "early".to_string(), 100).unwrap();
    assert_eq!(a.latest_value_by_event("event1").unwrap().as_deref(), Some("late"));

    // Same timestamp: the later push wins
    a.push_at("event1", "later".to_string(), 200).unwrap();
    assert_eq!(a.latest_value_by_event("event1").unwrap().as_deref(), Some("later"));
}
