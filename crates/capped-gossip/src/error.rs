//! Error types for capped-gossip

use thiserror::Error;

/// Errors that can occur in the gossip layer
#[derive(Debug, Error)]
pub enum GossipError {
    /// Failed to encode a frame
    #[error("failed to encode frame: {0}")]
    EncodeFailed(String),

    /// Failed to decode a frame
    #[error("failed to decode frame: {0}")]
    DecodeFailed(String),

    /// A link could not hand a frame to the far endpoint
    #[error("delivery failed on stream {0}")]
    DeliveryFailed(String),

    /// Generic gossip error
    #[error("gossip error: {0}")]
    Other(String),
}

impl From<postcard::Error> for GossipError {
    fn from(e: postcard::Error) -> Self {
        GossipError::EncodeFailed(e.to_string())
    }
}

/// Result type for gossip operations
pub type GossipResult<T> = Result<T, GossipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gossip_error_display() {
        let err = GossipError::DecodeFailed("truncated".to_string());
        assert!(format!("{}", err).contains("failed to decode"));
        assert!(format!("{}", err).contains("truncated"));

        let err = GossipError::DeliveryFailed("a->b".to_string());
        assert!(format!("{}", err).contains("a->b"));
    }
}
