//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::tech::TechNode;
use crate::types::SynthesisConfig;
use std::path::Path;

/// Loads and validates a `strata.toml` configuration from a file path.
pub fn load_config(path: &Path) -> Result<SynthesisConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `strata.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<SynthesisConfig, ConfigError> {
    let config: SynthesisConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks that configuration values are in range and mutually consistent.
///
/// Called again by the CLI after command-line overrides are applied.
pub fn validate_config(config: &SynthesisConfig) -> Result<(), ConfigError> {
    let arch = &config.architecture;
    if !(4..=8).contains(&arch.k) {
        return Err(ConfigError::ValidationError(format!(
            "architecture.k must be in 4..=8, got {}",
            arch.k
        )));
    }
    if arch.n == 0 {
        return Err(ConfigError::ValidationError(
            "architecture.n must be at least 1".to_string(),
        ));
    }
    if !(arch.density > 0.0 && arch.density <= 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "architecture.density must be in (0, 1], got {}",
            arch.density
        )));
    }
    if config.grid.width == 0 || config.grid.height == 0 {
        return Err(ConfigError::ValidationError(
            "grid dimensions must be non-zero".to_string(),
        ));
    }
    if config.characterization.robustness_level > 3 {
        return Err(ConfigError::ValidationError(format!(
            "characterization.robustness_level must be 0..=3, got {}",
            config.characterization.robustness_level
        )));
    }
    if config.characterization.jobs == 0 {
        return Err(ConfigError::ValidationError(
            "characterization.jobs must be at least 1".to_string(),
        ));
    }
    if config.padding.max_mux_fanin == Some(0) {
        return Err(ConfigError::ValidationError(
            "padding.max_mux_fanin must be at least 1".to_string(),
        ));
    }
    config.technology()?;
    Ok(())
}

impl SynthesisConfig {
    /// Resolves the process node: the `[tech]` override if given, else the preset.
    pub fn technology(&self) -> Result<TechNode, ConfigError> {
        if let Some(tech) = &self.tech {
            return Ok(tech.clone());
        }
        TechNode::preset(&self.architecture.tech)
            .ok_or_else(|| ConfigError::UnknownTechnology(self.architecture.tech.clone()))
    }
}
