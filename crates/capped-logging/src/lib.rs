//! JSONL and console logging for capped event logs
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines for log aggregation (default)
//! - **Pretty Console**: Human-readable output for development
//! - **Peer Context Injection**: Spans remember which peer opened them
//! - **File Rotation**: Daily/hourly rotation via tracing-appender
//!
//! # Quick Start
//!
//! ```ignore
//! use capped_logging::{CappedSubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! let _guard = CappedSubscriberBuilder::new().init()?;
//!
//! // Pretty output while developing
//! let _guard = CappedSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! `RUST_LOG` always wins over the configured default level.

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::{PeerContextData, PeerContextGuard, PeerType};
pub use layers::{PeerContextExtension, PeerContextLayer};

use std::fs::{self, File};
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to prepare log file in {path}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Result type for logging setup
pub type LoggingResult<T> = Result<T, LoggingError>;

/// Builder for the global tracing subscriber
///
/// Console output is JSONL unless the config asks for pretty output. File
/// output is always JSONL.
pub struct CappedSubscriberBuilder {
    config: LogConfig,
}

impl CappedSubscriberBuilder {
    /// Builder with the default configuration (JSONL to console)
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default filter directive
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration `init` will apply
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// Keep the returned guard alive for as long as file output is needed;
    /// dropping it flushes and stops the writer thread.
    pub fn init(self) -> LoggingResult<Option<WorkerGuard>> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let registry = Registry::default()
            .with(env_filter)
            .with(PeerContextLayer::new());

        let jsonl = &self.config.jsonl;
        let file_writer = self.config.file.as_ref().map(file_writer).transpose()?;

        // One arm per layer combination: the layer types differ
        let guard = match (self.config.console.enabled, self.config.console.pretty, file_writer) {
            (true, true, Some((writer, guard))) => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .with_ansi(self.config.console.ansi)
                    .with_target(true);
                registry
                    .with(console_layer)
                    .with(layers::jsonl_layer(writer, jsonl))
                    .try_init()?;
                Some(guard)
            }
            (true, false, Some((writer, guard))) => {
                registry
                    .with(layers::jsonl_layer(std::io::stdout, jsonl))
                    .with(layers::jsonl_layer(writer, jsonl))
                    .try_init()?;
                Some(guard)
            }
            (true, true, None) => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .with_ansi(self.config.console.ansi)
                    .with_target(true);
                registry.with(console_layer).try_init()?;
                None
            }
            (true, false, None) => {
                registry
                    .with(layers::jsonl_layer(std::io::stdout, jsonl))
                    .try_init()?;
                None
            }
            (false, _, Some((writer, guard))) => {
                registry.with(layers::jsonl_layer(writer, jsonl)).try_init()?;
                Some(guard)
            }
            (false, _, None) => {
                registry.try_init()?;
                None
            }
        };

        Ok(guard)
    }
}

impl Default for CappedSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking writer for the configured log file
fn file_writer(config: &FileConfig) -> LoggingResult<(NonBlocking, WorkerGuard)> {
    let io_error = |source| LoggingError::LogFile {
        path: config.directory.clone(),
        source,
    };

    fs::create_dir_all(&config.directory).map_err(io_error)?;

    let writer = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            let file = File::create(&path).map_err(io_error)?;
            tracing_appender::non_blocking(file)
        }
        RotationStrategy::Daily => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::DAILY,
            &config.directory,
            &config.prefix,
        )),
        RotationStrategy::Hourly => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::HOURLY,
            &config.directory,
            &config.prefix,
        )),
    };
    Ok(writer)
}

/// Install JSONL console logging, ignoring an already-set subscriber
pub fn init_default() {
    let _ = CappedSubscriberBuilder::new().init();
}

/// Install pretty debug console logging, ignoring an already-set subscriber
pub fn init_development() {
    let _ = CappedSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init();
}

/// Install warn-level logging for tests; safe to call from every test
pub fn init_testing() {
    let _ = CappedSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = CappedSubscriberBuilder::new();
        assert_eq!(builder.config().default_level, "info");
        assert!(!builder.config().console.pretty); // JSONL by default
    }

    #[test]
    fn test_builder_overrides() {
        let builder = CappedSubscriberBuilder::new()
            .with_config(LogConfig::development())
            .with_level("trace")
            .with_console(false);
        assert_eq!(builder.config().default_level, "trace");
        assert!(!builder.config().console.enabled);
    }

    #[test]
    fn test_file_writer_never_rotation_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig {
            directory: dir.path().join("nested"),
            prefix: "demo".to_string(),
            rotation: RotationStrategy::Never,
        };

        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(dir.path().join("nested").join("demo.log").exists());
    }

    #[test]
    fn test_init_testing_is_idempotent() {
        init_testing();
        init_testing();
        tracing::warn!("still logging");
    }
}
