//! Replication of event logs
//!
//! Plugs [`EventStore`] into the gossip layer as a [`Model`]. A local push
//! becomes an [`EventOp`]; the replica stamps it and forwards it, and every
//! operation (ours or a peer's) is applied through [`EventStore::append`].
//! Prunes are not operations: they never leave the instance.

use capped_core::{Millis, PeerIdentity};
use capped_gossip::{Model, Operation, Payload, VersionVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::record::EventRecord;
use crate::store::{validate_key, EventStore};

/// A replicable push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "V: Payload")]
pub struct EventOp<V: Payload> {
    pub key: String,
    pub value: V,
    pub timestamp: Millis,
    /// Origin's per-key sequence
    pub sequence: u64,
}

/// Outcome of an applied operation, handed to replica listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    pub key: String,
    /// Length of the key's log after the append
    pub length: usize,
}

impl<I: PeerIdentity, V: Payload> Model<I> for EventStore<I, V> {
    type Payload = EventOp<V>;
    type Applied = Appended;

    fn apply_update(&mut self, op: &Operation<I, EventOp<V>>) -> Option<Appended> {
        let EventOp {
            key,
            value,
            timestamp,
            sequence,
        } = &op.payload;

        // Peers are trusted, but a bad key must not create a log
        if let Err(e) = validate_key(key) {
            warn!(origin = %op.origin, stamp = op.stamp, error = %e, "rejecting operation");
            return None;
        }

        let record = EventRecord {
            value: value.clone(),
            timestamp: *timestamp,
            sequence: *sequence,
            source: op.origin.clone(),
            stamp: op.stamp,
        };
        let length = self.append(key, record);

        Some(Appended {
            key: key.clone(),
            length,
        })
    }

    fn history(&self, since: &VersionVector<I>) -> Vec<Operation<I, EventOp<V>>> {
        self.logs()
            .flat_map(|(key, log)| {
                log.records()
                    .iter()
                    .filter(|record| !since.contains(&record.source, record.stamp))
                    .map(move |record| {
                        Operation::new(
                            record.source.clone(),
                            record.stamp,
                            EventOp {
                                key: key.clone(),
                                value: record.value.clone(),
                                timestamp: record.timestamp,
                                sequence: record.sequence,
                            },
                        )
                    })
            })
            .collect()
    }
}
