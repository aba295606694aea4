//! Overflow detection
//!
//! A key is [`OverflowState::AtOrAbove`] once its length reaches the warning
//! line. The append that reaches the line only moves the key into that
//! state; every further append made while the key is at or above the line
//! emits an [`OverflowEvent`]. The monitor does not latch: it re-emits on
//! every such append, and it goes quiet again once a prune takes the key
//! back below the line.
//!
//! Subscribers are called synchronously, in subscription order, from the
//! thread that performed the append. The store lock is already released at
//! that point, so a subscriber may prune or query the instance.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default warning line for new instances
pub const DEFAULT_WARNING_LINE: usize = 1000;

/// Where a key stands relative to the warning line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowState {
    Below,
    AtOrAbove,
}

/// Notification that a key grew while at or above the warning line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverflowEvent {
    pub key: String,
    /// Length after the triggering append
    pub length: usize,
}

/// Handle returned by a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("sub-{_0}")]
pub struct SubscriptionId(u64);

#[derive(Clone)]
enum Subscriber {
    Callback(Arc<dyn Fn(&OverflowEvent) + Send + Sync>),
    Channel(mpsc::UnboundedSender<OverflowEvent>),
}

/// Warning-line policy plus its subscriber list
pub struct OverflowMonitor {
    warning_line: usize,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
}

impl OverflowMonitor {
    /// Create a monitor; `warning_line` is expected to be validated already
    pub fn new(warning_line: usize) -> Self {
        Self {
            warning_line,
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn warning_line(&self) -> usize {
        self.warning_line
    }

    /// State of a key with the given length
    pub fn state(&self, length: usize) -> OverflowState {
        if length >= self.warning_line {
            OverflowState::AtOrAbove
        } else {
            OverflowState::Below
        }
    }

    /// Register a callback
    pub fn subscribe(&self, callback: impl Fn(&OverflowEvent) + Send + Sync + 'static) -> SubscriptionId {
        self.add(Subscriber::Callback(Arc::new(callback)))
    }

    /// Register a channel; the receiver gets every later emission
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<OverflowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.add(Subscriber::Channel(tx)), rx)
    }

    fn add(&self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, subscriber));
        debug!(subscription = %id, "overflow subscriber added");
        id
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        before != subscribers.len()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Check one successful append
    ///
    /// `length` is the key's length after the append. Returns the emitted
    /// event, if any.
    pub fn observe(&self, key: &str, length: usize) -> Option<OverflowEvent> {
        // State before this append decides
        if self.state(length.saturating_sub(1)) == OverflowState::Below {
            return None;
        }

        let event = OverflowEvent {
            key: key.to_string(),
            length,
        };
        warn!(key, length, warning_line = self.warning_line, "event log over warning line");
        self.emit(&event);
        Some(event)
    }

    fn emit(&self, event: &OverflowEvent) {
        // Snapshot so callbacks can subscribe or unsubscribe
        let subscribers: Vec<(SubscriptionId, Subscriber)> = self.subscribers.read().clone();

        let mut closed = Vec::new();
        for (id, subscriber) in subscribers {
            match subscriber {
                Subscriber::Callback(callback) => callback(event),
                Subscriber::Channel(tx) => {
                    if tx.send(event.clone()).is_err() {
                        closed.push(id);
                    }
                }
            }
        }

        if !closed.is_empty() {
            self.subscribers
                .write()
                .retain(|(id, _)| !closed.contains(id));
            debug!(dropped = closed.len(), "dropped closed overflow channels");
        }
    }
}

impl Default for OverflowMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_WARNING_LINE)
    }
}
