//! # Capped Core
//!
//! Foundational types shared by every crate of the capped event log stack.
//!
//! ## Key Traits
//!
//! - [`PeerIdentity`]: Abstraction over peer identification (char for tests, names for real peers)
//! - [`Clock`]: Time abstraction so timestamp assignment can be driven by tests
//!
//! ## Key Types
//!
//! - [`PeerId`]: Named peer identity used by applications and configuration files
//! - [`SimulationIdentity`]: Single-letter identity used by tests and demos
//! - [`ValidationError`]: Rejections surfaced synchronously to callers

pub mod clock;
pub mod error;
pub mod identity;

pub use clock::*;
pub use error::*;
pub use identity::*;
