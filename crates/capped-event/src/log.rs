//! Per-key ordered log
//!
//! An [`EventLog`] holds the records of one key in `(timestamp, sequence)`
//! order. Appends are mostly at the tail; a record that arrives late (for
//! example a remote record with an older timestamp) is inserted at its
//! ordered position.

use capped_core::PeerIdentity;

use crate::record::EventRecord;

/// Ordered records of one key
#[derive(Debug, Clone)]
pub struct EventLog<I: PeerIdentity, V> {
    records: Vec<EventRecord<I, V>>,
    /// Next sequence for locally pushed records, never reused
    next_sequence: u64,
}

impl<I: PeerIdentity, V> EventLog<I, V> {
    /// Create an empty log
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in order
    pub fn records(&self) -> &[EventRecord<I, V>] {
        &self.records
    }

    /// Most recently ordered record
    pub fn latest(&self) -> Option<&EventRecord<I, V>> {
        self.records.last()
    }

    /// Reserve the sequence for the next local push
    pub fn reserve_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Insert a record at its ordered position
    ///
    /// Records that compare equal keep arrival order. Returns the index the
    /// record landed at.
    pub fn insert(&mut self, record: EventRecord<I, V>) -> usize {
        let index = self
            .records
            .partition_point(|existing| existing.order(&record).is_le());
        self.records.insert(index, record);
        index
    }

    /// Drop the `count` oldest records
    pub(crate) fn drop_oldest(&mut self, count: usize) -> usize {
        let count = count.min(self.records.len());
        self.records.drain(..count);
        count
    }
}

impl<I: PeerIdentity, V> Default for EventLog<I, V> {
    fn default() -> Self {
        Self::new()
    }
}
