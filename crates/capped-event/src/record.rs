//! Record types
//!
//! An [`EventRecord`] is one pushed value. Records never change after they
//! are appended; pruning removes them whole.

use std::cmp::Ordering;

use capped_core::{Millis, PeerIdentity};
use serde::{Deserialize, Serialize};

/// One pushed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity, V: Serialize + serde::de::DeserializeOwned")]
pub struct EventRecord<I: PeerIdentity, V> {
    /// Application payload
    pub value: V,
    /// Milliseconds since the Unix epoch
    pub timestamp: Millis,
    /// Per-key counter of the origin's pushes
    pub sequence: u64,
    /// Peer that pushed the value
    pub source: I,
    /// Causal stamp assigned by the origin's replica
    pub stamp: u64,
}

impl<I: PeerIdentity, V> EventRecord<I, V> {
    /// Position of this record relative to another record of the same key
    ///
    /// Records order by `(timestamp, sequence)`. Exact ties between origins
    /// fall back to the origin's byte form so every replica picks the same
    /// order.
    pub fn order(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.sequence.cmp(&other.sequence))
            .then_with(|| {
                if self.source == other.source {
                    Ordering::Equal
                } else {
                    self.source.as_bytes().cmp(&other.source.as_bytes())
                }
            })
    }
}

/// Latest record of a key with its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestUpdate<I, V> {
    /// `(key, value, timestamp)` as pushed
    pub entry: (String, V, Millis),
    /// Position of the record in its log
    pub index: usize,
    /// Peer that pushed it
    pub source: I,
}

impl<I, V> LatestUpdate<I, V> {
    pub fn key(&self) -> &str {
        &self.entry.0
    }

    pub fn value(&self) -> &V {
        &self.entry.1
    }

    pub fn timestamp(&self) -> Millis {
        self.entry.2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capped_core::SimulationIdentity;

    fn record(source: char, timestamp: Millis, sequence: u64) -> EventRecord<SimulationIdentity, u32> {
        EventRecord {
            value: 0,
            timestamp,
            sequence,
            source: SimulationIdentity::new(source).unwrap(),
            stamp: 1,
        }
    }

    #[test]
    fn test_timestamp_orders_first() {
        assert_eq!(record('A', 1, 9).order(&record('A', 2, 0)), Ordering::Less);
        assert_eq!(record('B', 3, 0).order(&record('A', 2, 5)), Ordering::Greater);
    }

    #[test]
    fn test_sequence_breaks_timestamp_ties() {
        assert_eq!(record('A', 5, 1).order(&record('A', 5, 2)), Ordering::Less);
    }

    #[test]
    fn test_origin_breaks_exact_ties() {
        assert_eq!(record('A', 5, 1).order(&record('B', 5, 1)), Ordering::Less);
        assert_eq!(record('B', 5, 1).order(&record('A', 5, 1)), Ordering::Greater);
        assert_eq!(record('A', 5, 1).order(&record('A', 5, 1)), Ordering::Equal);
    }
}
