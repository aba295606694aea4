//! Peer context for multi-instance logging
//!
//! Several capped event instances often share one process (tests, the demo).
//! A [`PeerContextGuard`] marks the current thread as acting for one peer so
//! [`crate::layers::PeerContextLayer`] can tag spans opened in that scope.

use std::cell::RefCell;

use capped_core::PeerIdentity;
use uuid::Uuid;

/// Peer context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerContextData {
    /// Short form of the peer identity
    pub peer_id: String,
    pub peer_type: PeerType,
    /// Unique id of this peer session
    pub instance_id: Uuid,
}

/// Kind of peer identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerType {
    /// Single-letter test identity
    Simulation,
    /// Configured peer name
    Named,
}

impl PeerType {
    fn of<I: PeerIdentity>() -> Self {
        if std::any::type_name::<I>().contains("SimulationIdentity") {
            PeerType::Simulation
        } else {
            PeerType::Named
        }
    }
}

impl std::fmt::Display for PeerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerType::Simulation => write!(f, "simulation"),
            PeerType::Named => write!(f, "named"),
        }
    }
}

thread_local! {
    static PEER_CONTEXT: RefCell<Option<PeerContextData>> = const { RefCell::new(None) };
}

/// RAII guard for peer context
///
/// Sets the peer context for the current thread and restores the previous
/// one on drop, so guards nest.
///
/// ```ignore
/// let _guard = PeerContextGuard::new(&peer);
/// tracing::info_span!("push").in_scope(|| tracing::info!("pushed"));
/// ```
pub struct PeerContextGuard {
    previous: Option<PeerContextData>,
}

impl PeerContextGuard {
    /// Enter the context of `identity` with a fresh instance id
    pub fn new<I: PeerIdentity>(identity: &I) -> Self {
        Self::with_instance_id(identity, Uuid::new_v4())
    }

    /// Enter the context of `identity` with a known instance id
    pub fn with_instance_id<I: PeerIdentity>(identity: &I, instance_id: Uuid) -> Self {
        let context = PeerContextData {
            peer_id: identity.short_id(),
            peer_type: PeerType::of::<I>(),
            instance_id,
        };
        let previous = PEER_CONTEXT.with(|ctx| ctx.borrow_mut().replace(context));
        Self { previous }
    }

    /// Current peer context, if any
    pub fn current() -> Option<PeerContextData> {
        PEER_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    pub fn current_peer_id() -> Option<String> {
        Self::current().map(|ctx| ctx.peer_id)
    }

    pub fn current_instance_id() -> Option<Uuid> {
        Self::current().map(|ctx| ctx.instance_id)
    }
}

impl Drop for PeerContextGuard {
    fn drop(&mut self) {
        PEER_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block inside a peer context
///
/// ```ignore
/// with_peer_context!(&peer, {
///     tracing::info!("pushing");
/// });
/// ```
#[macro_export]
macro_rules! with_peer_context {
    ($identity:expr, $body:block) => {{
        let _guard = $crate::context::PeerContextGuard::new($identity);
        $body
    }};
}
