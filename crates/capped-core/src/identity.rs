//! Peer identity abstractions
//!
//! This module provides the [`PeerIdentity`] trait that abstracts over
//! the ways a replica can be named:
//!
//! - `SimulationIdentity`: Simple char-based identity for testing ('A'..'Z')
//! - `PeerId`: Free-form name, as given in configuration files

use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::IdentityError;

/// Trait for peer identity abstraction
///
/// Every record carries the identity of the peer that originated it, and the
/// replication layer keys its version vectors by identity, so identities must
/// be hashable and serializable.
pub trait PeerIdentity:
    Clone + Eq + Hash + Send + Sync + Debug + Display + Serialize + DeserializeOwned + 'static
{
    /// Get the identity as bytes
    ///
    /// The byte form also provides a stable total order between identities,
    /// which replicas use to break exact ordering ties deterministically.
    fn as_bytes(&self) -> Vec<u8>;

    /// Create an identity from bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError>;

    /// Get a short display form (for logging)
    fn short_id(&self) -> String {
        format!("{}", self)
    }
}

/// Simple character-based identity for simulation
///
/// Used for testing and development. Maps to characters 'A'..'Z'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimulationIdentity(pub char);

impl SimulationIdentity {
    /// Create a new simulation identity from a capital letter
    pub fn new(c: char) -> Option<Self> {
        if c.is_ascii_uppercase() {
            Some(Self(c))
        } else {
            None
        }
    }

    /// Generate all identities from 'A' to the given letter (inclusive)
    pub fn range_to(end: char) -> Vec<Self> {
        ('A'..=end).filter_map(Self::new).collect()
    }

    /// Get the underlying character
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl Display for SimulationIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PeerIdentity for SimulationIdentity {
    fn as_bytes(&self) -> Vec<u8> {
        vec![self.0 as u8]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        if bytes.len() != 1 {
            return Err(IdentityError::InvalidKeyLength {
                expected: 1,
                actual: bytes.len(),
            });
        }
        let c = bytes[0] as char;
        Self::new(c).ok_or_else(|| {
            IdentityError::InvalidFormat(format!("Invalid simulation identity: {}", c))
        })
    }

    fn short_id(&self) -> String {
        self.0.to_string()
    }
}

/// Named peer identity
///
/// Any non-empty string without surrounding whitespace. This is the identity
/// type used when replicas are configured from files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer id, rejecting empty or padded names
    pub fn new(name: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IdentityError::InvalidFormat("peer id is empty".into()));
        }
        if name.trim() != name {
            return Err(IdentityError::InvalidFormat(format!(
                "peer id has surrounding whitespace: {:?}",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Get the name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PeerId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

impl PeerIdentity for PeerId {
    fn as_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let name = std::str::from_utf8(bytes)
            .map_err(|e| IdentityError::InvalidFormat(e.to_string()))?;
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_identity_creation() {
        assert!(SimulationIdentity::new('A').is_some());
        assert!(SimulationIdentity::new('Z').is_some());
        assert!(SimulationIdentity::new('a').is_none());
        assert!(SimulationIdentity::new('1').is_none());
    }

    #[test]
    fn test_simulation_identity_range() {
        let ids = SimulationIdentity::range_to('C');
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0].0, 'A');
        assert_eq!(ids[2].0, 'C');
    }

    #[test]
    fn test_simulation_identity_bytes_roundtrip() {
        let id = SimulationIdentity::new('M').unwrap();
        let recovered = SimulationIdentity::from_bytes(&id.as_bytes()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_peer_id_validation() {
        assert!(PeerId::new("A").is_ok());
        assert!(PeerId::new("node-1").is_ok());
        assert!(PeerId::new("").is_err());
        assert!(PeerId::new(" A").is_err());
        assert!(PeerId::new("A\n").is_err());
    }

    #[test]
    fn test_peer_id_display() {
        let id = PeerId::new("replica-a").unwrap();
        assert_eq!(id.to_string(), "replica-a");
        assert_eq!(id.short_id(), "replica-a");
    }

    #[test]
    fn test_peer_id_rejects_empty_on_deserialize() {
        let bytes = postcard::to_allocvec(&String::new()).unwrap();
        let result: Result<PeerId, _> = postcard::from_bytes(&bytes);
        assert!(result.is_err());

        let bytes = postcard::to_allocvec(&"B".to_string()).unwrap();
        let id: PeerId = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(id.as_str(), "B");
    }
}
