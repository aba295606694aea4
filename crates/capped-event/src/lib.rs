//! # Capped Event
//!
//! Per-key event logs that stay bounded, can be pruned, and replicate
//! between peers.
//!
//! Each key holds its records in `(timestamp, sequence)` order. When a key
//! grows while at or above the instance's warning line, subscribers get an
//! [`OverflowEvent`], whether the growth came from a local push or from a
//! peer. Pruning by age or by count is local housekeeping.
//!
//! ## Example
//!
//! ```rust,ignore
//! use capped_core::SimulationIdentity;
//! use capped_event::{CappedEvent, CappedEventConfig};
//! use capped_gossip::{link, StreamOptions};
//!
//! let a = CappedEvent::<_, i64>::new(CappedEventConfig::new(SimulationIdentity('A')))?;
//! let b = CappedEvent::<_, i64>::new(
//!     CappedEventConfig::new(SimulationIdentity('B')).with_warning_line(5),
//! )?;
//!
//! b.on_overflow(|event| println!("{} has {} records", event.key, event.length));
//!
//! let _link = link(
//!     a.create_stream(StreamOptions::new("a->b")),
//!     b.create_stream(StreamOptions::new("b->a")),
//! );
//!
//! for i in 0..9 {
//!     a.push("event1", i)?;
//! }
//! ```

pub mod capped;
pub mod config;
pub mod error;
pub mod log;
pub mod overflow;
pub mod prune;
pub mod record;
pub mod replication;
pub mod store;

// Re-exports
pub use capped::CappedEvent;
pub use config::CappedEventConfig;
pub use error::{EventError, EventResult};
pub use log::EventLog;
pub use overflow::{DEFAULT_WARNING_LINE, OverflowEvent, OverflowMonitor, OverflowState, SubscriptionId};
pub use record::{EventRecord, LatestUpdate};
pub use replication::{Appended, EventOp};
pub use store::{EventStore, validate_key};
