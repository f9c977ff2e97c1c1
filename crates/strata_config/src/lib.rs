//! Configuration for a Strata synthesis run.
//!
//! A run is described by a [`SynthesisConfig`], deserialized from a
//! `strata.toml` file and validated before any phase starts. The config is
//! threaded explicitly through every phase; nothing is kept in global state.
//! [`Cluster`] holds the quantities derived from the logic-cluster shape.

#![warn(missing_docs)]

pub mod cluster;
pub mod error;
pub mod loader;
pub mod tech;
pub mod types;

pub use cluster::Cluster;
pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, validate_config};
pub use tech::TechNode;
pub use types::{
    ArchitectureConfig, CharacterizationConfig, DriverConfig, DriverStrength, ExportConfig,
    GridConfig, LogicDelays, PaddingConfig, PatternConfig, SynthesisConfig,
};
