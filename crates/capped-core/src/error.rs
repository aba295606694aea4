//! Error types shared across the capped event log stack

use thiserror::Error;

/// Errors related to peer identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

/// Input rejected before any state is touched
///
/// Validation failures are always returned to the caller; nothing in the
/// stack swallows them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Event key is empty")]
    EmptyKey,

    #[error("Invalid event key: {0:?}")]
    InvalidKey(String),

    #[error("Invalid warning line: {0} (must be at least 1)")]
    InvalidWarningLine(usize),
}
