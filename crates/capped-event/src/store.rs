//! Per-key event storage
//!
//! The [`EventStore`] owns every [`EventLog`] of one instance. Local pushes
//! and remote merges both end in [`EventStore::append`], so ordering and
//! length bookkeeping are identical regardless of where a record came from.

use std::collections::HashMap;
use std::sync::Arc;

use capped_core::{Clock, Millis, PeerIdentity, ValidationError};
use tracing::{debug, trace};

use crate::log::EventLog;
use crate::prune;
use crate::record::{EventRecord, LatestUpdate};

/// Check an event key before it touches any state
///
/// Keys must be non-empty, carry no surrounding whitespace and contain no
/// control characters.
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }
    if key.trim() != key || key.chars().any(char::is_control) {
        return Err(ValidationError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// All logs of one instance
pub struct EventStore<I: PeerIdentity, V> {
    /// Local identity, the source of locally pushed records
    id: I,
    logs: HashMap<String, EventLog<I, V>>,
    clock: Arc<dyn Clock>,
    /// Last timestamp handed out to a push without one
    last_default: Millis,
}

impl<I: PeerIdentity, V: Clone> EventStore<I, V> {
    /// Create an empty store
    pub fn new(id: I, clock: Arc<dyn Clock>) -> Self {
        Self {
            id,
            logs: HashMap::new(),
            clock,
            last_default: Millis::MIN,
        }
    }

    /// Local identity
    pub fn id(&self) -> &I {
        &self.id
    }

    /// Timestamp for a push that did not bring its own
    ///
    /// Never goes backwards, even if the clock does.
    pub fn default_timestamp(&mut self) -> Millis {
        let now = self.clock.now_millis().max(self.last_default);
        self.last_default = now;
        now
    }

    /// Reserve the sequence for a local push to `key`
    ///
    /// Creates the log if needed.
    pub fn reserve_sequence(&mut self, key: &str) -> u64 {
        self.logs.entry(key.to_string()).or_default().reserve_sequence()
    }

    /// Append a record, local or remote
    ///
    /// Returns the new length of the key's log.
    pub fn append(&mut self, key: &str, record: EventRecord<I, V>) -> usize {
        let log = self.logs.entry(key.to_string()).or_default();
        let index = log.insert(record);
        trace!(key, index, length = log.len(), "record appended");
        log.len()
    }

    /// Number of records under `key` (0 if unknown)
    pub fn length_by_event(&self, key: &str) -> usize {
        self.logs.get(key).map_or(0, EventLog::len)
    }

    /// Sum of all key lengths
    pub fn total_length(&self) -> usize {
        self.logs.values().map(EventLog::len).sum()
    }

    /// Value of the most recently ordered record under `key`
    pub fn latest_value_by_event(&self, key: &str) -> Option<V> {
        self.logs
            .get(key)
            .and_then(EventLog::latest)
            .map(|record| record.value.clone())
    }

    /// Most recently ordered record under `key` with its metadata
    pub fn latest_update_by_event(&self, key: &str) -> Option<LatestUpdate<I, V>> {
        let log = self.logs.get(key)?;
        let record = log.latest()?;
        Some(LatestUpdate {
            entry: (key.to_string(), record.value.clone(), record.timestamp),
            index: log.len() - 1,
            source: record.source.clone(),
        })
    }

    /// Keys with a log, empty ones included
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.logs.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Snapshot of the records under `key`
    pub fn records_by_event(&self, key: &str) -> Vec<EventRecord<I, V>> {
        self.logs
            .get(key)
            .map(|log| log.records().to_vec())
            .unwrap_or_default()
    }

    /// Iterate over every log
    pub fn logs(&self) -> impl Iterator<Item = (&String, &EventLog<I, V>)> {
        self.logs.iter()
    }

    /// Age-based prune of one key; unknown keys are left alone
    pub fn prune_before(&mut self, age_ms: Millis, key: &str) -> usize {
        let Some(log) = self.logs.get_mut(key) else {
            return 0;
        };
        let removed = prune::prune_before(log, age_ms);
        debug!(key, age_ms, removed, remaining = log.len(), "pruned by age");
        removed
    }

    /// Count-based prune of one key; returns the remaining length
    pub fn prune_to(&mut self, max_count: usize, key: &str) -> usize {
        let Some(log) = self.logs.get_mut(key) else {
            return 0;
        };
        let before = log.len();
        let remaining = prune::prune_to(log, max_count);
        debug!(key, max_count, removed = before - remaining, remaining, "pruned by count");
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capped_core::{ManualClock, SimulationIdentity};

    fn peer(c: char) -> SimulationIdentity {
        SimulationIdentity::new(c).unwrap()
    }

    fn store_at(start: Millis) -> (EventStore<SimulationIdentity, i32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        (EventStore::new(peer('A'), clock.clone()), clock)
    }

    fn local(store: &mut EventStore<SimulationIdentity, i32>, key: &str, value: i32, timestamp: Millis) -> usize {
        let sequence = store.reserve_sequence(key);
        let record = EventRecord {
            value,
            timestamp,
            sequence,
            source: store.id().clone(),
            stamp: sequence + 1,
        };
        store.append(key, record)
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("event1").is_ok());
        assert!(validate_key("with space inside").is_ok());
        assert_eq!(validate_key(""), Err(ValidationError::EmptyKey));
        assert!(matches!(validate_key(" padded"), Err(ValidationError::InvalidKey(_))));
        assert!(matches!(validate_key("tab\there"), Err(ValidationError::InvalidKey(_))));
    }

    #[test]
    fn test_lengths_per_key_and_total() {
        let (mut store, _) = store_at(0);
        local(&mut store, "event1", 1, 1);
        local(&mut store, "event1", 2, 2);
        local(&mut store, "event2", 3, 3);

        assert_eq!(store.length_by_event("event1"), 2);
        assert_eq!(store.length_by_event("event2"), 1);
        assert_eq!(store.length_by_event("unknown"), 0);
        assert_eq!(store.total_length(), 3);
        assert_eq!(store.keys(), vec!["event1".to_string(), "event2".to_string()]);
    }

    #[test]
    fn test_default_timestamp_is_monotonic() {
        let (mut store, clock) = store_at(1_000);
        assert_eq!(store.default_timestamp(), 1_000);

        clock.set(900);
        assert_eq!(store.default_timestamp(), 1_000);

        clock.advance(200);
        assert_eq!(store.default_timestamp(), 1_100);
    }

    #[test]
    fn test_latest_update_metadata() {
        let (mut store, _) = store_at(0);
        assert!(store.latest_update_by_event("event1").is_none());

        local(&mut store, "event1", 7, 2);
        let update = store.latest_update_by_event("event1").unwrap();
        assert_eq!(update.entry, ("event1".to_string(), 7, 2));
        assert_eq!(update.index, 0);
        assert_eq!(update.source, peer('A'));
    }

    #[test]
    fn test_remote_record_keeps_origin() {
        let (mut store, _) = store_at(0);
        local(&mut store, "k", 1, 10);
        store.append(
            "k",
            EventRecord {
                value: 2,
                timestamp: 20,
                sequence: 0,
                source: peer('B'),
                stamp: 1,
            },
        );

        let update = store.latest_update_by_event("k").unwrap();
        assert_eq!(update.source, peer('B'));
        assert_eq!(update.index, 1);
    }

    #[test]
    fn test_prune_on_unknown_key_is_noop() {
        let (mut store, _) = store_at(0);
        assert_eq!(store.prune_before(100, "nothing"), 0);
        assert_eq!(store.prune_to(1, "nothing"), 0);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_pruned_log_stays_known() {
        let (mut store, _) = store_at(0);
        local(&mut store, "k", 1, 1);
        assert_eq!(store.prune_to(0, "k"), 0);
        assert_eq!(store.keys(), vec!["k".to_string()]);
        assert!(store.latest_value_by_event("k").is_none());
    }
}
