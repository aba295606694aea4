//! # Capped Gossip
//!
//! In-process causal-history replication for capped event logs.
//!
//! A [`Replica`] wraps any [`Model`] and keeps it in sync with peers over
//! streams. Each replica stamps its own operations with a per-origin
//! counter and tracks what it has applied in a [`VersionVector`]; streams
//! open with a digest exchange so each side replays only what the other is
//! missing, then forward live operations.
//!
//! ## Features
//!
//! - Version-vector duplicate suppression (each operation applied once)
//! - Per-origin ordering preserved across relays
//! - Read-only and write-only stream modes
//! - Versioned postcard frame codec
//! - In-memory [`link`] for tests and single-process deployments
//!
//! ## Example
//!
//! ```rust,ignore
//! use capped_gossip::{link, Replica, StreamOptions};
//!
//! let a = Replica::new(peer_a, model_a);
//! let b = Replica::new(peer_b, model_b);
//!
//! let link = link(
//!     a.create_stream(StreamOptions::new("a->b")),
//!     b.create_stream(StreamOptions::new("b->a")),
//! );
//!
//! a.local_update(|model| model.prepare("hello"))?;
//! // b applies the operation once the link delivers it
//! ```

pub mod error;
pub mod message;
pub mod replica;
pub mod stream;
pub mod version;

// Re-exports
pub use error::{GossipError, GossipResult};
pub use message::{Frame, Operation, Payload, ReceivedFrame, WireMessage};
pub use replica::{Model, Replica, StreamId};
pub use stream::{link, Endpoint, Link, StreamMode, StreamOptions};
pub use version::VersionVector;
