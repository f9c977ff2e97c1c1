//! Error types for configuration loading and validation.

use strata_common::SynthesisError;

/// Errors that can occur when loading or validating a `strata.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// The named process node has no preset and no `[tech]` override was given.
    #[error("unknown technology '{0}'")]
    UnknownTechnology(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for SynthesisError {
    fn from(err: ConfigError) -> Self {
        SynthesisError::Config(err.to_string())
    }
}
