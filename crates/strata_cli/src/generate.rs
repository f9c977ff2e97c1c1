//! `strata generate`: synthesize one architecture end to end.
//!
//! Orchestrates the pipeline:
//! 1. Parse the channel composition and rescale it to the cluster
//! 2. Balance unit-length wires against the tile area (or import a padding log)
//! 3. Characterize switch delays, or inherit them from a prior architecture
//! 4. Export the routing-resource graph and the architecture description
//!
//! Every artifact is rendered in memory before anything is written, so a
//! failing phase leaves the output directory untouched.

use std::path::{Path, PathBuf};

use strata_channel::Composition;
use strata_common::{DelayRecord, SynthResult, SynthesisError};
use strata_config::{validate_config, SynthesisConfig};
use strata_export::{
    read_switch_delays, resize_layout, ArchitectureWriter, Grid, RrGraphDocument, RrGraphExporter,
    SegmentTable, SwitchTable,
};
use strata_layout::{square_grid, Balancer};
use strata_spice::{Characterizer, CircuitSimulator, ProcessSimulator};
use tracing::info;

use crate::pipeline::{apply_cluster, load_settings};
use crate::{GenerateArgs, GlobalArgs};

/// Runs the `strata generate` command.
///
/// Returns exit code 0 on success; fatal synthesis errors propagate.
pub fn run(args: &GenerateArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = load_settings(global)?;
    apply_cluster(&mut config, &args.cluster)?;
    apply_overrides(&mut config, args)?;

    let text = std::fs::read_to_string(&args.wire_file).map_err(SynthesisError::from)?;
    let composition = Composition::parse(&text)?;

    if !global.quiet {
        eprintln!(
            "   Building {} (K={} N={}, {})",
            config.architecture.name,
            config.architecture.k,
            config.architecture.n,
            config.architecture.tech
        );
    }

    let inherited = match &config.export.inherit_delays_from {
        Some(path) => {
            if !global.quiet {
                eprintln!("  Inheriting delays from {}", path.display());
            }
            Some(std::fs::read_to_string(path).map_err(SynthesisError::from)?)
        }
        None => None,
    };

    let simulator = ProcessSimulator::new(&config.characterization);
    let artifacts = synthesize(
        &config,
        &composition,
        &simulator,
        inherited.as_deref(),
        args.only_pad,
    )?;

    if !global.quiet {
        eprintln!(
            "   Balanced in {} steps{}",
            artifacts.steps,
            if artifacts.fanin_limited {
                " (stopped at the fan-in ceiling)"
            } else {
                ""
            }
        );
        if let Some(exports) = &artifacts.exports {
            eprintln!(
                "   Exported {} nodes, {} edges, {} delays on a {}x{} grid",
                exports.rr_graph.node_count,
                exports.rr_graph.edge_count,
                exports.delays.len(),
                exports.grid.width(),
                exports.grid.height()
            );
        }
    }
    if global.verbose {
        eprintln!("{}", artifacts.padding_log);
    }

    let written = artifacts.write(
        &config.export.output_dir,
        &config.architecture.name,
        config.export.compress,
    )?;
    if !global.quiet {
        for path in &written {
            eprintln!("     Wrote {}", path.display());
        }
    }
    Ok(0)
}

/// Applies the `generate` flags on top of the configuration.
fn apply_overrides(
    config: &mut SynthesisConfig,
    args: &GenerateArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(name) = &args.name {
        config.architecture.name = name.clone();
    }
    if let Some(width) = args.width {
        config.grid.width = width;
    }
    if let Some(height) = args.height {
        config.grid.height = height;
    }
    config.grid.physical_square |= args.physical_square;
    config.grid.top_bottom_io |= args.top_bottom_io;
    config.pattern.separate_taps |= args.separate_taps;
    if let Some(log) = &args.import_padding {
        config.padding.import_log = Some(log.clone());
    }
    if let Some(arch) = &args.inherit_delays {
        config.export.inherit_delays_from = Some(arch.clone());
    }
    if let Some(level) = args.robustness {
        config.characterization.robustness_level = level;
    }
    if let Some(jobs) = args.jobs {
        config.characterization.jobs = jobs;
    }
    if let Some(dir) = &args.output_dir {
        config.export.output_dir = dir.clone();
    }
    config.export.compress |= args.compress;
    validate_config(config).map_err(SynthesisError::from)?;
    Ok(())
}

/// Everything one run produces, held in memory until written.
pub struct Artifacts {
    /// Padding log of the balanced composition.
    pub padding_log: String,
    /// Accepted balancing steps.
    pub steps: usize,
    /// Whether the fan-in ceiling ended balancing early.
    pub fanin_limited: bool,
    /// Exported descriptions; absent when only padding was requested.
    pub exports: Option<Exports>,
}

/// The place-and-route inputs of one architecture.
pub struct Exports {
    /// Device grid the graph was instantiated over.
    pub grid: Grid,
    /// Switch delays used for the export.
    pub delays: DelayRecord,
    /// The routing-resource graph.
    pub rr_graph: RrGraphDocument,
    /// The architecture description.
    pub architecture: String,
}

impl Artifacts {
    /// Writes every artifact under `dir` and returns the paths written.
    pub fn write(&self, dir: &Path, name: &str, compress: bool) -> SynthResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        let log = dir.join(format!("{name}_padding.log"));
        std::fs::write(&log, &self.padding_log)?;
        written.push(log);
        if let Some(exports) = &self.exports {
            let arch = dir.join(format!("{name}.xml"));
            std::fs::write(&arch, &exports.architecture)?;
            written.push(arch);
            written.push(
                exports
                    .rr_graph
                    .write(&dir.join(format!("{name}_rr.xml")), compress)?,
            );
        }
        Ok(written)
    }
}

/// Runs every synthesis phase for one composition.
///
/// With `inherited` set, switch delays are read from that architecture
/// description and its layout is resized to the new grid instead of
/// characterizing; `simulator` is then never called.
pub fn synthesize(
    config: &SynthesisConfig,
    composition: &Composition,
    simulator: &dyn CircuitSimulator,
    inherited: Option<&str>,
    only_pad: bool,
) -> SynthResult<Artifacts> {
    let balancer = Balancer::new(config)?;
    let cluster = *balancer.cluster();
    let balanced = balancer.run(&composition.scaled_to(&cluster))?;
    info!(
        composition = ?balanced.composition.summary_lines(),
        fanin_limited = balanced.fanin_limited,
        "balanced"
    );

    let mut artifacts = Artifacts {
        padding_log: balanced.padding_log(),
        steps: balanced.history.len(),
        fanin_limited: balanced.fanin_limited,
        exports: None,
    };
    if only_pad {
        return Ok(artifacts);
    }

    let grid_config = &config.grid;
    let (width, height) = if grid_config.physical_square {
        square_grid(grid_config.width, grid_config.height, balanced.tile, balanced.metal)
    } else {
        (grid_config.width, grid_config.height)
    };
    let grid = Grid::generate(width, height, grid_config.top_bottom_io, grid_config.cut_corners);

    let delays = match inherited {
        Some(text) => read_switch_delays(text)?,
        None => Characterizer::new(config, &balanced, &cluster, balancer.tech()).run(simulator)?,
    };

    let separate_taps = config.pattern.separate_taps;
    let switches = SwitchTable::build(&balanced.graph, &delays)?;
    let segments = SegmentTable::build(&balanced.graph);
    let arch_file = format!("{}.xml", config.architecture.name);
    let rr_graph = RrGraphExporter::new(
        &balanced.graph,
        &cluster,
        &grid,
        &switches,
        &segments,
        separate_taps,
    )
    .export(&arch_file)?;
    let architecture = match inherited {
        Some(text) => resize_layout(text, grid.width(), grid.height())?,
        None => ArchitectureWriter::new(&cluster, &grid, &switches, &segments, separate_taps)
            .render(&config.logic_delays, &delays)?,
    };

    artifacts.exports = Some(Exports {
        grid,
        delays,
        rr_graph,
        architecture,
    });
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_spice::{LocalWireQuery, SimulationJob};

    /// Reports 10p for every wire, 3p through the BLE mux and 7p for
    /// connection blocks.
    struct ScriptedSimulator;

    impl CircuitSimulator for ScriptedSimulator {
        fn simulate(&self, job: &SimulationJob) -> SynthResult<String> {
            let mut listing = String::new();
            for name in &job.measures {
                let value = if name.ends_with("ble_mux") { "3.0p" } else { "10.0p" };
                listing.push_str(&format!(" {name}= {value} targ= 1.0n trig= 1.0n\n"));
            }
            Ok(listing)
        }

        fn local_wire_delay(&self, _query: &LocalWireQuery) -> SynthResult<f64> {
            Ok(7e-12)
        }
    }

    struct UnreachableSimulator;

    impl CircuitSimulator for UnreachableSimulator {
        fn simulate(&self, job: &SimulationJob) -> SynthResult<String> {
            panic!("simulated {} with inherited delays", job.name)
        }

        fn local_wire_delay(&self, _query: &LocalWireQuery) -> SynthResult<f64> {
            panic!("queried a local wire with inherited delays")
        }
    }

    fn setup() -> (tempfile::TempDir, SynthesisConfig, Composition) {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("ref_padding.log");
        std::fs::write(&log, "Channel composition after padding:\n\nH1 2\nV1 1\n").unwrap();
        let mut config = SynthesisConfig::default();
        config.architecture.n = 2;
        config.architecture.name = "k6n2".to_string();
        config.grid.width = 8;
        config.grid.height = 8;
        config.padding.import_log = Some(log);
        config.characterization.robustness_level = 0;
        config.characterization.jobs = 2;
        let composition = Composition::parse("H 2 1\nV 4 1\n").unwrap();
        (dir, config, composition)
    }

    #[test]
    fn characterized_run_exports_everything() {
        let (_dir, config, composition) = setup();
        let artifacts = synthesize(&config, &composition, &ScriptedSimulator, None, false).unwrap();
        assert!(artifacts.padding_log.contains("H1 2\n"));
        assert_eq!(artifacts.steps, 1);

        let exports = artifacts.exports.unwrap();
        assert_eq!((exports.grid.width(), exports.grid.height()), (8, 8));
        assert!(exports.rr_graph.xml.starts_with("<rr_graph"));
        assert!(exports.rr_graph.xml.contains("Generated from arch file k6n2.xml"));
        assert!(exports.rr_graph.edge_count > 0);

        let delays = read_switch_delays(&exports.architecture).unwrap();
        assert_eq!(delays.get("cb"), Some(7e-12));
        let h1 = exports.delays.get("H1").unwrap();
        assert!((delays.get("H1").unwrap() - h1).abs() < 1e-16);
        assert!(exports.architecture.contains("<fixed_layout name=\"fix\" width=\"8\" height=\"8\">"));
    }

    #[test]
    fn inherited_run_resizes_and_skips_simulation() {
        let (_dir, mut config, composition) = setup();
        let first = synthesize(&config, &composition, &ScriptedSimulator, None, false)
            .unwrap()
            .exports
            .unwrap();

        config.grid.width = 10;
        config.grid.height = 9;
        let second = synthesize(
            &config,
            &composition,
            &UnreachableSimulator,
            Some(&first.architecture),
            false,
        )
        .unwrap()
        .exports
        .unwrap();
        assert!(second
            .architecture
            .contains("<fixed_layout name=\"fix\" width=\"10\" height=\"9\">"));
        assert_eq!(second.delays, read_switch_delays(&first.architecture).unwrap());
        assert_eq!(
            second.architecture.lines().count(),
            first.architecture.lines().count()
        );
    }

    #[test]
    fn inherited_delays_must_cover_every_switch() {
        let (_dir, config, composition) = setup();
        let partial = "<fixed_layout name=\"fix\" width=\"8\" height=\"8\">\n\
                       <switch type=\"mux\" name=\"cb\" Tdel=\"1e-11\"/>\n</switchlist>\n";
        let err = synthesize(&config, &composition, &UnreachableSimulator, Some(partial), false)
            .err()
            .unwrap();
        assert_eq!(err.phase(), "export");
    }

    #[test]
    fn only_pad_stops_after_balancing() {
        let (_dir, config, composition) = setup();
        let artifacts =
            synthesize(&config, &composition, &UnreachableSimulator, None, true).unwrap();
        assert!(artifacts.exports.is_none());

        let out = tempfile::tempdir().unwrap();
        let written = artifacts.write(out.path(), "k6n2", false).unwrap();
        assert_eq!(written, vec![out.path().join("k6n2_padding.log")]);
    }

    #[test]
    fn physical_square_reshapes_grid() {
        let (_dir, mut config, composition) = setup();
        config.grid.width = 12;
        config.grid.height = 12;
        config.grid.physical_square = true;
        let exports = synthesize(&config, &composition, &ScriptedSimulator, None, false)
            .unwrap()
            .exports
            .unwrap();
        let (w, h) = (exports.grid.width(), exports.grid.height());
        assert!(w * h >= 144);
        assert!(exports
            .architecture
            .contains(&format!("width=\"{w}\" height=\"{h}\"")));
    }

    #[test]
    fn compressed_write_names() {
        let (_dir, config, composition) = setup();
        let artifacts = synthesize(&config, &composition, &ScriptedSimulator, None, false).unwrap();
        let out = tempfile::tempdir().unwrap();
        let written = artifacts.write(&out.path().join("arch"), "k6n2", true).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written[2].to_string_lossy().ends_with("k6n2_rr.xml.gz"));
        assert!(written.iter().all(|p| p.is_file()));
    }
}
