//! Shared helpers for CLI commands: configuration resolution and the
//! command-line overrides applied on top of it.

use std::path::{Path, PathBuf};

use strata_config::{load_config, validate_config, SynthesisConfig};

use crate::{ClusterArgs, GlobalArgs};

/// Configuration file picked up from the working directory.
pub const DEFAULT_CONFIG: &str = "strata.toml";

/// Resolves the configuration file to read, if any.
///
/// An explicit `--config` wins; otherwise `strata.toml` in `dir` is used
/// when present.
pub fn config_path(global: &GlobalArgs, dir: &Path) -> Option<PathBuf> {
    match &global.config {
        Some(path) => Some(path.clone()),
        None => {
            let candidate = dir.join(DEFAULT_CONFIG);
            candidate.is_file().then_some(candidate)
        }
    }
}

/// Loads the configuration, or the defaults when no file is found.
pub fn load_settings(global: &GlobalArgs) -> Result<SynthesisConfig, Box<dyn std::error::Error>> {
    let dir = std::env::current_dir()?;
    match config_path(global, &dir) {
        Some(path) => Ok(load_config(&path).map_err(strata_common::SynthesisError::from)?),
        None => Ok(SynthesisConfig::default()),
    }
}

/// Applies cluster overrides and re-validates.
pub fn apply_cluster(
    config: &mut SynthesisConfig,
    args: &ClusterArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(k) = args.k {
        config.architecture.k = k;
    }
    if let Some(n) = args.n {
        config.architecture.n = n;
    }
    if let Some(tech) = &args.tech {
        config.architecture.tech = tech.clone();
    }
    validate_config(config).map_err(strata_common::SynthesisError::from)?;
    Ok(())
}
