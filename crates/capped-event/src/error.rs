//! Error types for capped-event

use std::path::PathBuf;

use capped_core::ValidationError;
use capped_gossip::GossipError;
use thiserror::Error;

/// Errors surfaced by a capped event log
#[derive(Debug, Error)]
pub enum EventError {
    /// Rejected input, nothing was changed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Failure reported by the replication layer
    ///
    /// Local state stays valid and queryable; nothing is retried.
    #[error("Replication failed: {0}")]
    Replication(#[from] GossipError),

    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result type for event log operations
pub type EventResult<T> = Result<T, EventError>;
