//! The capped event log
//!
//! [`CappedEvent`] ties the pieces together: an [`EventStore`] replicated
//! by a [`Replica`], and an [`OverflowMonitor`] listening to every applied
//! operation. Cloning a `CappedEvent` gives another handle to the same
//! instance.

use std::sync::Arc;

use capped_core::{Clock, Millis, PeerIdentity, SystemClock};
use capped_gossip::{Endpoint, Payload, Replica, StreamOptions, VersionVector};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::config::CappedEventConfig;
use crate::error::{EventError, EventResult};
use crate::overflow::{OverflowEvent, OverflowMonitor, SubscriptionId};
use crate::record::{EventRecord, LatestUpdate};
use crate::replication::{Appended, EventOp};
use crate::store::{validate_key, EventStore};

/// A capped, prunable, replicable set of per-key event logs
pub struct CappedEvent<I: PeerIdentity, V: Payload> {
    replica: Replica<I, EventStore<I, V>>,
    monitor: Arc<OverflowMonitor>,
}

impl<I: PeerIdentity, V: Payload> Clone for CappedEvent<I, V> {
    fn clone(&self) -> Self {
        Self {
            replica: self.replica.clone(),
            monitor: Arc::clone(&self.monitor),
        }
    }
}

impl<I: PeerIdentity, V: Payload> CappedEvent<I, V> {
    /// Create an instance timestamping pushes with the system clock
    pub fn new(config: CappedEventConfig<I>) -> EventResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an instance with a custom time source
    pub fn with_clock(config: CappedEventConfig<I>, clock: Arc<dyn Clock>) -> EventResult<Self> {
        config.validate()?;

        let monitor = Arc::new(OverflowMonitor::new(config.warning_line));
        let store = EventStore::new(config.id.clone(), clock);
        let replica = Replica::new(config.id, store);

        let listener = Arc::clone(&monitor);
        replica.on_applied(move |applied: &Appended| {
            listener.observe(&applied.key, applied.length);
        });

        debug!(id = %replica.id(), warning_line = config.warning_line, "capped event created");
        Ok(Self { replica, monitor })
    }

    /// Local identity
    pub fn id(&self) -> &I {
        self.replica.id()
    }

    pub fn warning_line(&self) -> usize {
        self.monitor.warning_line()
    }

    /// Push a value stamped with the current time
    pub fn push(&self, key: &str, value: V) -> EventResult<()> {
        self.push_with(key, value, None)
    }

    /// Push a value with an explicit timestamp (milliseconds since the epoch)
    pub fn push_at(&self, key: &str, value: V, timestamp: Millis) -> EventResult<()> {
        self.push_with(key, value, Some(timestamp))
    }

    #[instrument(skip(self, value), fields(id = %self.replica.id()))]
    fn push_with(&self, key: &str, value: V, timestamp: Option<Millis>) -> EventResult<()> {
        validate_key(key)?;

        self.replica.local_update(|store| {
            let timestamp = match timestamp {
                Some(timestamp) => timestamp,
                None => store.default_timestamp(),
            };
            let sequence = store.reserve_sequence(key);
            Ok::<_, EventError>(EventOp {
                key: key.to_string(),
                value,
                timestamp,
                sequence,
            })
        })?;
        Ok(())
    }

    /// Number of records under `key` (0 if unknown)
    pub fn length_by_event(&self, key: &str) -> EventResult<usize> {
        validate_key(key)?;
        Ok(self.replica.read(|store| store.length_by_event(key)))
    }

    /// Sum of all key lengths
    pub fn total_length(&self) -> usize {
        self.replica.read(EventStore::total_length)
    }

    /// Value of the most recently ordered record under `key`
    pub fn latest_value_by_event(&self, key: &str) -> EventResult<Option<V>> {
        validate_key(key)?;
        Ok(self.replica.read(|store| store.latest_value_by_event(key)))
    }

    /// Most recently ordered record under `key`, with its position and origin
    pub fn latest_update_by_event(&self, key: &str) -> EventResult<Option<LatestUpdate<I, V>>> {
        validate_key(key)?;
        Ok(self.replica.read(|store| store.latest_update_by_event(key)))
    }

    /// Keys with a log, sorted
    pub fn keys(&self) -> Vec<String> {
        self.replica.read(EventStore::keys)
    }

    /// Snapshot of the records under `key`
    pub fn records_by_event(&self, key: &str) -> EventResult<Vec<EventRecord<I, V>>> {
        validate_key(key)?;
        Ok(self.replica.read(|store| store.records_by_event(key)))
    }

    /// Drop records older than `age_ms` relative to the newest record of `key`
    ///
    /// Local only. Unknown keys are left alone.
    pub fn prune_before(&self, age_ms: Millis, key: &str) -> EventResult<()> {
        validate_key(key)?;
        self.replica.write(|store| store.prune_before(age_ms, key));
        Ok(())
    }

    /// Keep the `max_count` most recent records of `key`
    ///
    /// Local only. Returns the remaining length.
    pub fn prune_to(&self, max_count: usize, key: &str) -> EventResult<usize> {
        validate_key(key)?;
        Ok(self.replica.write(|store| store.prune_to(max_count, key)))
    }

    /// Call `callback` on every overflow emission
    pub fn on_overflow(
        &self,
        callback: impl Fn(&OverflowEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.monitor.subscribe(callback)
    }

    /// Receive overflow emissions over a channel
    pub fn overflow_events(&self) -> mpsc::UnboundedReceiver<OverflowEvent> {
        self.monitor.subscribe_channel().1
    }

    /// Stop a callback subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.monitor.unsubscribe(id)
    }

    /// Open a replication stream; connect the endpoint to a peer's
    ///
    /// Must be called inside a Tokio runtime.
    pub fn create_stream(&self, options: StreamOptions) -> Endpoint {
        self.replica.create_stream(options)
    }

    /// Highest stamp applied per origin
    pub fn version(&self) -> VersionVector<I> {
        self.replica.clock()
    }

    /// Number of open replication streams
    pub fn stream_count(&self) -> usize {
        self.replica.stream_count()
    }
}
