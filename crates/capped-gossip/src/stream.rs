//! Stream endpoints and in-process links
//!
//! A replica hands out one [`Endpoint`] per stream. The endpoint is the
//! transport side of the stream: frames the replica wants the peer to see
//! come out of it, and frames from the peer are pushed into it. [`link`]
//! pipes two endpoints together with in-memory channels, which is all the
//! transport a test or a single-process deployment needs.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let a_end = replica_a.create_stream(StreamOptions::new("a->b"));
//! let b_end = replica_b.create_stream(StreamOptions::new("b->a"));
//! let link = link(a_end, b_end);
//!
//! // later
//! link.close();
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{GossipError, GossipResult};

/// Direction restrictions for one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamMode {
    /// Send local operations and apply the peer's
    #[default]
    Duplex,
    /// Only send operations this replica originated; the peer's are ignored
    ///
    /// Operations relayed from third parties are not forwarded.
    ReadOnly,
    /// Only apply the peer's operations; nothing of ours is sent
    WriteOnly,
}

impl StreamMode {
    /// Whether operations flow from us to the peer
    pub fn sends(self) -> bool {
        matches!(self, StreamMode::Duplex | StreamMode::ReadOnly)
    }

    /// Whether operations from the peer are applied
    pub fn receives(self) -> bool {
        matches!(self, StreamMode::Duplex | StreamMode::WriteOnly)
    }

    /// Whether an operation may go out, given whether we originated it
    pub fn may_send(self, local: bool) -> bool {
        match self {
            StreamMode::Duplex => true,
            StreamMode::ReadOnly => local,
            StreamMode::WriteOnly => false,
        }
    }
}

/// Options for [`crate::Replica::create_stream`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Name used in logs and errors
    pub name: String,
    /// Direction restrictions
    #[serde(default)]
    pub mode: StreamMode,
}

impl StreamOptions {
    /// Duplex stream with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: StreamMode::Duplex,
        }
    }

    /// Set the direction restrictions
    pub fn with_mode(mut self, mode: StreamMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for a read-only stream
    pub fn read_only(name: impl Into<String>) -> Self {
        Self::new(name).with_mode(StreamMode::ReadOnly)
    }

    /// Shorthand for a write-only stream
    pub fn write_only(name: impl Into<String>) -> Self {
        Self::new(name).with_mode(StreamMode::WriteOnly)
    }
}

/// Transport side of a replica stream
pub struct Endpoint {
    name: String,
    /// Frames the replica sends to the peer
    outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Where frames from the peer are delivered
    incoming: mpsc::UnboundedSender<Vec<u8>>,
}

impl Endpoint {
    pub(crate) fn new(
        name: String,
        outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
        incoming: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            name,
            outgoing,
            incoming,
        }
    }

    /// Stream name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next frame the replica wants delivered to the peer
    ///
    /// Returns `None` once the replica has dropped the stream.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.outgoing.recv().await
    }

    /// Next frame without waiting
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.outgoing.try_recv().ok()
    }

    /// Hand a frame from the peer to the replica
    pub fn send(&self, frame: Vec<u8>) -> GossipResult<()> {
        self.incoming
            .send(frame)
            .map_err(|_| GossipError::DeliveryFailed(self.name.clone()))
    }

    /// Split into (name, outgoing frames, incoming sender)
    pub fn into_parts(
        self,
    ) -> (
        String,
        mpsc::UnboundedReceiver<Vec<u8>>,
        mpsc::UnboundedSender<Vec<u8>>,
    ) {
        (self.name, self.outgoing, self.incoming)
    }
}

/// A running bidirectional pipe between two endpoints
pub struct Link {
    names: (String, String),
    tasks: Vec<JoinHandle<GossipResult<()>>>,
}

impl Link {
    /// Names of the two linked endpoints
    pub fn names(&self) -> (&str, &str) {
        (&self.names.0, &self.names.1)
    }

    /// Stop propagation in both directions
    ///
    /// Operations already applied on either side stay applied.
    pub fn close(&self) {
        for task in &self.tasks {
            task.abort();
        }
        debug!(a = %self.names.0, b = %self.names.1, "link closed");
    }

    /// Whether both directions have stopped
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|task| task.is_finished())
    }

    /// Wait for both directions to finish
    ///
    /// Returns the first delivery failure, if any. A link stopped with
    /// [`Link::close`] finishes cleanly.
    pub async fn join(self) -> GossipResult<()> {
        let mut result = Ok(());
        for task in self.tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => Ok(()),
                Err(e) => Err(GossipError::Other(e.to_string())),
            };
            if result.is_ok() {
                result = outcome;
            }
        }
        result
    }
}

/// Pipe two endpoints together
///
/// Must be called inside a Tokio runtime. Each direction runs as its own
/// task and preserves frame order.
pub fn link(a: Endpoint, b: Endpoint) -> Link {
    let (a_name, a_out, a_in) = a.into_parts();
    let (b_name, b_out, b_in) = b.into_parts();

    debug!(a = %a_name, b = %b_name, "linking endpoints");

    let tasks = vec![
        tokio::spawn(pipe(a_name.clone(), a_out, b_in)),
        tokio::spawn(pipe(b_name.clone(), b_out, a_in)),
    ];

    Link {
        names: (a_name, b_name),
        tasks,
    }
}

async fn pipe(
    name: String,
    mut from: mpsc::UnboundedReceiver<Vec<u8>>,
    to: mpsc::UnboundedSender<Vec<u8>>,
) -> GossipResult<()> {
    while let Some(frame) = from.recv().await {
        if to.send(frame).is_err() {
            warn!(stream = %name, "peer endpoint dropped, stopping pipe");
            return Err(GossipError::DeliveryFailed(name));
        }
    }
    debug!(stream = %name, "endpoint drained");
    Ok(())
}
