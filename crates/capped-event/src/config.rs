//! Instance configuration
//!
//! ```toml
//! id = "replica-a"
//! warning_line = 500
//! ```
//!
//! `warning_line` may be omitted and defaults to [`DEFAULT_WARNING_LINE`].

use std::fs;
use std::path::Path;

use capped_core::{PeerIdentity, ValidationError};
use serde::{Deserialize, Serialize};

use crate::error::{EventError, EventResult};
use crate::overflow::DEFAULT_WARNING_LINE;

fn default_warning_line() -> usize {
    DEFAULT_WARNING_LINE
}

/// Configuration for a [`crate::CappedEvent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity")]
pub struct CappedEventConfig<I: PeerIdentity> {
    /// Identity stamped on every local push
    pub id: I,
    /// Length at which a key counts as overflowing
    #[serde(default = "default_warning_line")]
    pub warning_line: usize,
}

impl<I: PeerIdentity> CappedEventConfig<I> {
    /// Config with the default warning line
    pub fn new(id: I) -> Self {
        Self {
            id,
            warning_line: DEFAULT_WARNING_LINE,
        }
    }

    pub fn with_warning_line(mut self, warning_line: usize) -> Self {
        self.warning_line = warning_line;
        self
    }

    /// Reject unusable settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.warning_line == 0 {
            return Err(ValidationError::InvalidWarningLine(self.warning_line));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> EventResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> EventResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| EventError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capped_core::PeerId;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults() {
        let config = CappedEventConfig::new(PeerId::new("A").unwrap());
        assert_eq!(config.warning_line, DEFAULT_WARNING_LINE);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_zero_warning_line_is_rejected() {
        let config = CappedEventConfig::new(PeerId::new("A").unwrap()).with_warning_line(0);
        assert_eq!(config.validate(), Err(ValidationError::InvalidWarningLine(0)));
    }

    #[test]
    fn test_from_toml() {
        let config: CappedEventConfig<PeerId> =
            CappedEventConfig::from_toml_str("id = \"replica-b\"\nwarning_line = 5\n").unwrap();
        assert_eq!(config.id.as_str(), "replica-b");
        assert_eq!(config.warning_line, 5);

        let config: CappedEventConfig<PeerId> =
            CappedEventConfig::from_toml_str("id = \"replica-a\"").unwrap();
        assert_eq!(config.warning_line, DEFAULT_WARNING_LINE);
    }

    #[test]
    fn test_bad_toml() {
        let result = CappedEventConfig::<PeerId>::from_toml_str("id = \"\"");
        assert!(matches!(result, Err(EventError::ConfigParse(_))));

        let result = CappedEventConfig::<PeerId>::from_toml_str("id = \"a\"\nwarning_line = 0");
        assert!(matches!(
            result,
            Err(EventError::Validation(ValidationError::InvalidWarningLine(0)))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id = \"from-file\"").unwrap();
        writeln!(file, "warning_line = 42").unwrap();

        let config = assert_ok!(CappedEventConfig::<PeerId>::load(file.path()));
        assert_eq!(config.id.as_str(), "from-file");
        assert_eq!(config.warning_line, 42);

        let missing = assert_err!(CappedEventConfig::<PeerId>::load("/definitely/not/here.toml"));
        assert!(matches!(missing, EventError::ConfigIo { .. }));
    }
}
