//! Operations and the frame codec
//!
//! Frames are postcard-encoded and wrapped in a versioned envelope so the
//! format can evolve. Frames are not signed: peers are trusted.

use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

use capped_core::PeerIdentity;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{GossipError, GossipResult};
use crate::version::VersionVector;

/// Anything a model can replicate
pub trait Payload: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A replicable operation
///
/// `stamp` is assigned by the origin's replica and increases by one for
/// every operation that origin submits, across all keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity, P: Payload")]
pub struct Operation<I: PeerIdentity, P: Payload> {
    /// Replica that submitted the operation
    pub origin: I,
    /// Per-origin causal counter
    pub stamp: u64,
    /// Model-specific content
    pub payload: P,
}

impl<I: PeerIdentity, P: Payload> Operation<I, P> {
    /// Create an operation
    pub fn new(origin: I, stamp: u64, payload: P) -> Self {
        Self {
            origin,
            stamp,
            payload,
        }
    }
}

/// Messages exchanged over a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity, P: Payload")]
pub enum Frame<I: PeerIdentity, P: Payload> {
    /// Handshake: what the sender has already applied
    Digest { clock: VersionVector<I> },
    /// One operation, replayed from history or forwarded live
    Update(Operation<I, P>),
    /// History replay finished; live updates follow
    SyncDone,
}

impl<I: PeerIdentity, P: Payload> Frame<I, P> {
    /// Encode for the wire
    pub fn encode(&self) -> GossipResult<Vec<u8>> {
        let sent_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;

        let wire_message = WireMessage::V0 {
            sent_at,
            frame: postcard::to_allocvec(self)?,
        };

        postcard::to_allocvec(&wire_message).map_err(Into::into)
    }

    /// Decode a frame produced by [`Frame::encode`]
    pub fn decode(bytes: &[u8]) -> GossipResult<ReceivedFrame<I, P>> {
        let wire_message: WireMessage =
            postcard::from_bytes(bytes).map_err(|e| GossipError::DecodeFailed(e.to_string()))?;

        let WireMessage::V0 { sent_at, frame } = wire_message;

        let frame: Frame<I, P> =
            postcard::from_bytes(&frame).map_err(|e| GossipError::DecodeFailed(e.to_string()))?;

        Ok(ReceivedFrame { sent_at, frame })
    }

    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Digest { .. } => "digest",
            Frame::Update(_) => "update",
            Frame::SyncDone => "sync-done",
        }
    }
}

/// Wire format for frames (versioned for future compatibility)
#[derive(Debug, Serialize, Deserialize)]
pub enum WireMessage {
    /// Version 0 format
    V0 {
        /// Send time in microseconds since UNIX epoch
        sent_at: u64,
        /// Serialized Frame bytes
        frame: Vec<u8>,
    },
}

/// A decoded frame
#[derive(Debug, Clone)]
pub struct ReceivedFrame<I: PeerIdentity, P: Payload> {
    /// Send time (microseconds since UNIX epoch)
    pub sent_at: u64,
    /// The frame itself
    pub frame: Frame<I, P>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use capped_core::SimulationIdentity;

    type TestFrame = Frame<SimulationIdentity, (String, i64)>;

    fn peer(c: char) -> SimulationIdentity {
        SimulationIdentity::new(c).unwrap()
    }

    #[test]
    fn test_update_survives_the_wire() {
        let op = Operation::new(peer('A'), 7, ("event1".to_string(), 42));
        let bytes = TestFrame::Update(op.clone()).encode().unwrap();

        let received = TestFrame::decode(&bytes).unwrap();
        assert!(received.sent_at > 0);
        assert_eq!(received.frame, Frame::Update(op));
    }

    #[test]
    fn test_digest_carries_clock() {
        let mut clock = VersionVector::new();
        clock.observe(&peer('A'), 3);
        clock.observe(&peer('B'), 9);

        let bytes = TestFrame::Digest {
            clock: clock.clone(),
        }
        .encode()
        .unwrap();

        match TestFrame::decode(&bytes).unwrap().frame {
            Frame::Digest { clock: decoded } => assert_eq!(decoded, clock),
            other => panic!("Expected digest, got {}", other.kind()),
        }
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = TestFrame::decode(&[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(GossipError::DecodeFailed(_))));
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let bytes = TestFrame::SyncDone.encode().unwrap();
        let result = TestFrame::decode(&bytes[..bytes.len() - 1]);
        assert!(result.is_err());
    }
}
