//! Configuration types deserialized from `strata.toml`.

use crate::tech::TechNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The complete configuration of one synthesis run.
///
/// Every section is optional in the file; missing sections take their
/// defaults, so an empty `strata.toml` describes a K=6, N=8 fabric on the
/// `F4` process node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Logic-cluster shape and process node.
    #[serde(default)]
    pub architecture: ArchitectureConfig,
    /// Device grid dimensions and periphery rules.
    #[serde(default)]
    pub grid: GridConfig,
    /// Switch-pattern policy flags.
    #[serde(default)]
    pub pattern: PatternConfig,
    /// Area-balancing loop settings.
    #[serde(default)]
    pub padding: PaddingConfig,
    /// Wire driver strengths.
    #[serde(default)]
    pub drivers: DriverConfig,
    /// Delay characterization settings.
    #[serde(default)]
    pub characterization: CharacterizationConfig,
    /// Intra-cluster logic delays copied into the architecture description.
    #[serde(default)]
    pub logic_delays: LogicDelays,
    /// Full process-node override, replacing the preset named by `architecture.tech`.
    #[serde(default)]
    pub tech: Option<TechNode>,
    /// Output settings.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Logic-cluster shape and process node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureConfig {
    /// Architecture name used for output file names.
    pub name: String,
    /// LUT size.
    pub k: u32,
    /// Cluster size (BLEs per cluster).
    pub n: u32,
    /// Crossbar population density in `(0, 1]`.
    pub density: f64,
    /// Process-node preset name (`F16`, `F7`, `F5`, `F4`, `F3a`, `F3b`).
    pub tech: String,
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self {
            name: "strata".to_string(),
            k: 6,
            n: 8,
            density: 0.5,
            tech: "F4".to_string(),
        }
    }
}

/// Device grid dimensions and periphery rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Grid width in tiles, including the I/O ring.
    pub width: u32,
    /// Grid height in tiles, including the I/O ring.
    pub height: u32,
    /// Place I/O only on the top and bottom rows.
    pub top_bottom_io: bool,
    /// Leave the four corner tiles empty.
    pub cut_corners: bool,
    /// Resize the grid so the die is physically square.
    pub physical_square: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            top_bottom_io: false,
            cut_corners: true,
            physical_square: false,
        }
    }
}

/// Switch-pattern policy flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Disjoint switch-block pattern (otherwise full).
    pub disjoint_sb: bool,
    /// Disjoint connection-block pattern (otherwise full).
    pub disjoint_cb: bool,
    /// Add twist edges between minimal wires of adjacent slots.
    pub twists: bool,
    /// Restrict twists to continuation connections.
    pub continuation_twists_only: bool,
    /// Drop twists that wrap across a cluster boundary.
    pub cut_cross_cluster_twists: bool,
    /// Model every vertical tap as its own node.
    pub separate_taps: bool,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            disjoint_sb: true,
            disjoint_cb: true,
            twists: true,
            continuation_twists_only: true,
            cut_cross_cluster_twists: true,
            separate_taps: false,
        }
    }
}

/// Area-balancing loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddingConfig {
    /// Growth stops before any multiplexer exceeds this fan-in.
    pub max_mux_fanin: Option<u32>,
    /// Upper bound on balancing steps per direction.
    pub max_iterations: u32,
    /// Padding log of a canonical run to import instead of iterating.
    pub import_log: Option<PathBuf>,
}

impl Default for PaddingConfig {
    fn default() -> Self {
        Self {
            max_mux_fanin: Some(16),
            max_iterations: 10_000,
            import_log: None,
        }
    }
}

/// A two-stage driver strength (first and second inverter sizes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStrength {
    /// First-stage strength.
    pub d0: u32,
    /// Second-stage strength.
    pub d1: u32,
}

impl DriverStrength {
    /// Creates a driver strength pair.
    pub fn new(d0: u32, d1: u32) -> Self {
        Self { d0, d1 }
    }
}

/// Wire driver strengths keyed by wire length.
///
/// Lengths missing from the tables use the zero-strength default driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Driver of connection-block (local) wires.
    pub local: DriverStrength,
    /// Horizontal wire drivers keyed by length.
    pub h: BTreeMap<String, DriverStrength>,
    /// Vertical wire drivers keyed by length.
    pub v: BTreeMap<String, DriverStrength>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            local: DriverStrength::new(2, 4),
            h: BTreeMap::new(),
            v: BTreeMap::new(),
        }
    }
}

impl DriverConfig {
    /// Returns the driver of a horizontal wire.
    pub fn horizontal(&self, length: u32) -> DriverStrength {
        self.h.get(&length.to_string()).copied().unwrap_or_default()
    }

    /// Returns the driver of a vertical wire.
    pub fn vertical(&self, length: u32) -> DriverStrength {
        self.v.get(&length.to_string()).copied().unwrap_or_default()
    }
}

/// Delay characterization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterizationConfig {
    /// Sampling policy, 0 (cheapest) to 3 (exhaustive).
    pub robustness_level: u8,
    /// Maximum number of concurrent simulator invocations.
    pub jobs: usize,
    /// Circuit simulator executable.
    pub simulator: String,
    /// Command answering local-wire delay queries.
    pub local_wire_command: Option<String>,
    /// Directory receiving decks and simulator listings.
    pub work_dir: PathBuf,
    /// Transistor model library referenced by every deck.
    pub model_library: String,
}

impl Default for CharacterizationConfig {
    fn default() -> Self {
        Self {
            robustness_level: 2,
            jobs: 4,
            simulator: "hspice".to_string(),
            local_wire_command: None,
            work_dir: PathBuf::from("sim"),
            model_library: "models/tech.lib".to_string(),
        }
    }
}

/// Intra-cluster logic delays, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicDelays {
    /// LUT input to output.
    pub lut: f64,
    /// Flip-flop setup time.
    pub ff_setup: f64,
    /// Flip-flop clock-to-Q.
    pub ff_clk_to_q: f64,
    /// Input pad to fabric.
    pub inpad: f64,
    /// Fabric to output pad.
    pub outpad: f64,
}

impl Default for LogicDelays {
    fn default() -> Self {
        Self {
            lut: 100e-12,
            ff_setup: 20e-12,
            ff_clk_to_q: 40e-12,
            inpad: 50e-12,
            outpad: 50e-12,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory receiving the generated files.
    pub output_dir: PathBuf,
    /// Gzip the routing-resource graph.
    pub compress: bool,
    /// Previously exported architecture whose switch delays are reused.
    pub inherit_delays_from: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_k6n8() {
        let config = SynthesisConfig::default();
        assert_eq!(config.architecture.k, 6);
        assert_eq!(config.architecture.n, 8);
        assert_eq!(config.characterization.robustness_level, 2);
        assert_eq!(config.padding.max_mux_fanin, Some(16));
        assert!(config.pattern.disjoint_sb);
        assert!(!config.pattern.separate_taps);
    }

    #[test]
    fn driver_lookup_defaults_to_zero() {
        let mut drivers = DriverConfig::default();
        drivers.h.insert("4".to_string(), DriverStrength::new(3, 8));
        assert_eq!(drivers.horizontal(4), DriverStrength::new(3, 8));
        assert_eq!(drivers.horizontal(2), DriverStrength::default());
        assert_eq!(drivers.vertical(4), DriverStrength::new(0, 0));
    }

    #[test]
    fn config_serde_roundtrip() {
        let config = SynthesisConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: SynthesisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}
