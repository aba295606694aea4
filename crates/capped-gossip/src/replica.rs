//! Replica: a model plus the bookkeeping that keeps it in sync with peers
//!
//! The replica owns the [`Model`], the [`VersionVector`] of everything
//! applied so far and the set of open streams. All mutations of the model go
//! through the replica's state lock, so a local update, a remote merge and a
//! direct model edit never interleave.
//!
//! ## Stream protocol
//!
//! 1. On creation a stream sends our digest (version vector).
//! 2. When the peer's digest arrives we replay every operation the peer has
//!    not seen, in stamp order, then send `SyncDone`. From then on local and
//!    relayed operations are forwarded live.
//! 3. Incoming updates already covered by our vector (or originated by us)
//!    are dropped; everything else is applied and relayed to the other
//!    synced streams.
//!
//! Read-only streams carry only operations this replica originated.
//!
//! ## Listeners
//!
//! Listeners registered with [`Replica::on_applied`] run after the state
//! lock is released, so they may call back into the replica. Applies are
//! queued under the state lock and delivered one at a time under a separate
//! delivery lock, so every listener sees them in apply order even when a
//! local update and a stream merge race on different threads. When a call
//! returns, its notification has been delivered, unless the call was made
//! from inside a listener: then it is delivered as soon as that listener
//! returns.

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use capped_core::PeerIdentity;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::message::{Frame, Operation, Payload};
use crate::stream::{Endpoint, StreamMode, StreamOptions};
use crate::version::VersionVector;

/// State that a replica keeps in sync
pub trait Model<I: PeerIdentity>: Send + 'static {
    /// Operation content
    type Payload: Payload;

    /// What a successful apply reports to listeners
    type Applied: Clone + Send + Sync + 'static;

    /// Apply an operation, local or remote
    ///
    /// Returns `None` if the model rejects it; rejected operations are not
    /// forwarded.
    fn apply_update(&mut self, op: &Operation<I, Self::Payload>) -> Option<Self::Applied>;

    /// Operations not covered by `since`, for replay to a peer
    fn history(&self, since: &VersionVector<I>) -> Vec<Operation<I, Self::Payload>>;
}

type Listener<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Identifier of a stream within one replica
pub type StreamId = u64;

struct StreamSink {
    name: String,
    mode: StreamMode,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    /// Peer digest received and history replayed
    synced: bool,
}

struct ReplicaState<I: PeerIdentity, M: Model<I>> {
    model: M,
    clock: VersionVector<I>,
    streams: HashMap<StreamId, StreamSink>,
    next_stream: StreamId,
    /// Applies not yet handed to listeners, in apply order
    pending: VecDeque<M::Applied>,
}

impl<I: PeerIdentity, M: Model<I>> ReplicaState<I, M> {
    /// Forward an operation to every synced stream that may carry it
    fn forward(&mut self, op: &Operation<I, M::Payload>, except: Option<StreamId>, own: &I) {
        let local = op.origin == *own;
        let carries = |id: &StreamId, sink: &StreamSink| {
            Some(*id) != except && sink.synced && sink.mode.may_send(local)
        };

        let targets = self.streams.iter().filter(|(id, sink)| carries(*id, *sink)).count();
        if targets == 0 {
            return;
        }

        let frame = match Frame::Update(op.clone()).encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(origin = %op.origin, stamp = op.stamp, error = %e, "failed to encode update");
                return;
            }
        };

        let mut dead = Vec::new();
        for (id, sink) in &self.streams {
            if !carries(id, sink) {
                continue;
            }
            if sink.outgoing.send(frame.clone()).is_err() {
                dead.push(*id);
            }
        }
        self.drop_streams(dead);
    }

    fn drop_streams(&mut self, ids: Vec<StreamId>) {
        for id in ids {
            if let Some(sink) = self.streams.remove(&id) {
                warn!(stream = %sink.name, "stream endpoint gone, dropping stream");
            }
        }
    }
}

struct Shared<I: PeerIdentity, M: Model<I>> {
    id: I,
    state: Mutex<ReplicaState<I, M>>,
    listeners: RwLock<Vec<Listener<M::Applied>>>,
    /// Held while draining `pending`; the flag marks a drain in progress
    delivery: ReentrantMutex<Cell<bool>>,
}

/// Clears the draining flag, even if a listener panics
struct Draining<'a>(&'a Cell<bool>);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A model replicated with peers over streams
pub struct Replica<I: PeerIdentity, M: Model<I>> {
    shared: Arc<Shared<I, M>>,
}

impl<I: PeerIdentity, M: Model<I>> Clone for Replica<I, M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<I: PeerIdentity, M: Model<I>> Replica<I, M> {
    /// Create a replica around a model
    pub fn new(id: I, model: M) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                state: Mutex::new(ReplicaState {
                    model,
                    clock: VersionVector::new(),
                    streams: HashMap::new(),
                    next_stream: 0,
                    pending: VecDeque::new(),
                }),
                listeners: RwLock::new(Vec::new()),
                delivery: ReentrantMutex::new(Cell::new(false)),
            }),
        }
    }

    /// Our identity
    pub fn id(&self) -> &I {
        &self.shared.id
    }

    /// Snapshot of the version vector
    pub fn clock(&self) -> VersionVector<I> {
        self.shared.state.lock().clock.clone()
    }

    /// Read the model under the state lock
    pub fn read<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        f(&self.shared.state.lock().model)
    }

    /// Mutate the model directly under the state lock
    ///
    /// Nothing is stamped or forwarded: use this for local-only edits.
    pub fn write<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        f(&mut self.shared.state.lock().model)
    }

    /// Register a listener for every applied operation, local or remote
    pub fn on_applied(&self, listener: impl Fn(&M::Applied) + Send + Sync + 'static) {
        self.shared.listeners.write().push(Arc::new(listener));
    }

    /// Submit a local operation
    ///
    /// `build` runs under the state lock and produces the payload; the
    /// replica stamps it, applies it to the model and forwards it to every
    /// synced stream. Listeners run after the lock is released.
    pub fn local_update<E>(
        &self,
        build: impl FnOnce(&mut M) -> Result<M::Payload, E>,
    ) -> Result<Option<M::Applied>, E> {
        let applied = {
            let mut state = self.shared.state.lock();
            let payload = build(&mut state.model)?;

            let stamp = state.clock.get(&self.shared.id) + 1;
            state.clock.observe(&self.shared.id, stamp);

            let op = Operation::new(self.shared.id.clone(), stamp, payload);
            let applied = state.model.apply_update(&op);
            if let Some(applied) = &applied {
                state.forward(&op, None, &self.shared.id);
                state.pending.push_back(applied.clone());
            }
            applied
        };

        self.deliver_pending();
        Ok(applied)
    }

    /// Apply an operation that arrived from elsewhere
    ///
    /// Returns `None` for our own operations, operations already covered by
    /// the version vector, and operations the model rejects.
    pub fn apply_remote(&self, op: Operation<I, M::Payload>) -> Option<M::Applied> {
        self.merge(op, None)
    }

    fn merge(&self, op: Operation<I, M::Payload>, from: Option<StreamId>) -> Option<M::Applied> {
        let applied = {
            let mut state = self.shared.state.lock();
            if op.origin == self.shared.id || !state.clock.observe(&op.origin, op.stamp) {
                trace!(origin = %op.origin, stamp = op.stamp, "skipping known operation");
                return None;
            }

            let applied = state.model.apply_update(&op);
            if let Some(applied) = &applied {
                state.forward(&op, from, &self.shared.id);
                state.pending.push_back(applied.clone());
            }
            applied
        };

        self.deliver_pending();
        applied
    }

    /// Hand queued applies to the listeners, oldest first
    fn deliver_pending(&self) {
        let delivering = self.shared.delivery.lock();
        if delivering.get() {
            // A listener on this thread mutated the replica; the outer
            // drain picks the new apply up once that listener returns
            return;
        }
        delivering.set(true);
        let _draining = Draining(&*delivering);

        loop {
            let next = self.shared.state.lock().pending.pop_front();
            let Some(applied) = next else {
                break;
            };
            self.notify(&applied);
        }
    }

    fn notify(&self, applied: &M::Applied) {
        let listeners: Vec<_> = self.shared.listeners.read().iter().cloned().collect();
        for listener in listeners {
            listener(applied);
        }
    }

    /// Number of open streams
    pub fn stream_count(&self) -> usize {
        self.shared.state.lock().streams.len()
    }

    /// Names of streams whose history replay is complete
    pub fn synced_streams(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .streams
            .values()
            .filter(|sink| sink.synced)
            .map(|sink| sink.name.clone())
            .collect()
    }

    /// Open a stream for one peer
    ///
    /// Must be called inside a Tokio runtime: incoming frames are processed
    /// by a spawned task that lives until the endpoint's incoming side is
    /// dropped.
    pub fn create_stream(&self, options: StreamOptions) -> Endpoint {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let stream_id = {
            let mut state = self.shared.state.lock();
            let stream_id = state.next_stream;
            state.next_stream += 1;

            let digest = Frame::<I, M::Payload>::Digest {
                clock: state.clock.clone(),
            };
            match digest.encode() {
                Ok(frame) => {
                    // The receiver is still in our hands, this cannot fail
                    let _ = out_tx.send(frame);
                }
                Err(e) => warn!(stream = %options.name, error = %e, "failed to encode digest"),
            }

            state.streams.insert(
                stream_id,
                StreamSink {
                    name: options.name.clone(),
                    mode: options.mode,
                    outgoing: out_tx,
                    synced: false,
                },
            );
            stream_id
        };

        debug!(
            peer = %self.shared.id,
            stream = %options.name,
            mode = ?options.mode,
            "stream created"
        );

        let replica = self.clone();
        tokio::spawn(async move { replica.drive_stream(stream_id, in_rx).await });

        Endpoint::new(options.name, out_rx, in_tx)
    }

    async fn drive_stream(self, stream_id: StreamId, mut incoming: mpsc::UnboundedReceiver<Vec<u8>>) {
        while let Some(bytes) = incoming.recv().await {
            let frame = match Frame::<I, M::Payload>::decode(&bytes) {
                Ok(received) => received.frame,
                Err(e) => {
                    // Log and skip invalid frames
                    warn!(peer = %self.shared.id, error = %e, "failed to decode frame");
                    continue;
                }
            };

            match frame {
                Frame::Digest { clock } => self.replay_history(stream_id, &clock),
                Frame::Update(op) => {
                    if self.stream_mode(stream_id).is_some_and(StreamMode::receives) {
                        self.merge(op, Some(stream_id));
                    } else {
                        trace!(peer = %self.shared.id, "ignoring update on read-only stream");
                    }
                }
                Frame::SyncDone => {
                    debug!(peer = %self.shared.id, stream = stream_id, "peer finished history replay");
                }
            }
        }

        let mut state = self.shared.state.lock();
        if let Some(sink) = state.streams.remove(&stream_id) {
            debug!(peer = %self.shared.id, stream = %sink.name, "stream closed");
        }
    }

    fn stream_mode(&self, stream_id: StreamId) -> Option<StreamMode> {
        self.shared
            .state
            .lock()
            .streams
            .get(&stream_id)
            .map(|sink| sink.mode)
    }

    fn replay_history(&self, stream_id: StreamId, peer_clock: &VersionVector<I>) {
        let mut state = self.shared.state.lock();

        let mode = match state.streams.get(&stream_id) {
            Some(sink) => sink.mode,
            None => return,
        };

        let mut frames = Vec::new();
        if mode.sends() {
            let mut history = state.model.history(peer_clock);
            history.retain(|op| mode.may_send(op.origin == self.shared.id));
            // Per-origin order must survive the replay
            history.sort_by_key(|op| op.stamp);
            for op in history {
                match Frame::Update(op).encode() {
                    Ok(frame) => frames.push(frame),
                    Err(e) => warn!(error = %e, "failed to encode history entry"),
                }
            }
        }
        match Frame::<I, M::Payload>::SyncDone.encode() {
            Ok(frame) => frames.push(frame),
            Err(e) => warn!(error = %e, "failed to encode sync marker"),
        }

        let replayed = frames.len().saturating_sub(1);
        let mut alive = true;
        if let Some(sink) = state.streams.get_mut(&stream_id) {
            for frame in frames {
                if sink.outgoing.send(frame).is_err() {
                    alive = false;
                    break;
                }
            }
            sink.synced = true;
            debug!(stream = %sink.name, replayed, "history replayed");
        }
        if !alive {
            state.drop_streams(vec![stream_id]);
        }
    }
}
