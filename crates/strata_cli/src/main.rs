//! Strata CLI: routing-architecture synthesis for island-style FPGAs.
//!
//! Provides `strata enumerate` to list the channel compositions that fit a
//! cluster, and `strata generate` to balance one composition, characterize
//! its delays and export the routing-resource graph and architecture
//! description.

#![warn(missing_docs)]

mod enumerate;
mod generate;
mod pipeline;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use strata_common::SynthesisError;
use tracing_subscriber::EnvFilter;

/// Strata: routing-architecture synthesis.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about = "Strata FPGA routing-architecture synthesis")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `strata.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every feasible channel composition for the configured cluster.
    Enumerate(EnumerateArgs),
    /// Synthesize and export the architecture of one channel composition.
    Generate(GenerateArgs),
}

/// Cluster overrides shared by both subcommands.
#[derive(Parser, Debug, Default)]
pub struct ClusterArgs {
    /// LUT size.
    #[arg(short = 'K', long)]
    pub k: Option<u32>,

    /// BLEs per cluster.
    #[arg(short = 'N', long)]
    pub n: Option<u32>,

    /// Process node preset (e.g. F4, F3a).
    #[arg(long)]
    pub tech: Option<String>,
}

/// Arguments for the `strata enumerate` subcommand.
#[derive(Parser, Debug)]
pub struct EnumerateArgs {
    /// Cluster overrides.
    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// Directory receiving one `.wire` file per composition.
    /// Compositions are printed to stdout when omitted.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// Arguments for the `strata generate` subcommand.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Channel composition (`.wire`) file.
    pub wire_file: PathBuf,

    /// Cluster overrides.
    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// Architecture name used for the output files.
    #[arg(long)]
    pub name: Option<String>,

    /// Grid width in tiles.
    #[arg(long)]
    pub width: Option<u32>,

    /// Grid height in tiles.
    #[arg(long)]
    pub height: Option<u32>,

    /// Resize the grid so the die is physically square.
    #[arg(long)]
    pub physical_square: bool,

    /// Place I/O only on the top and bottom rows.
    #[arg(long)]
    pub top_bottom_io: bool,

    /// Model every vertical tap as its own node.
    #[arg(long)]
    pub separate_taps: bool,

    /// Stop after the balancing loop and write only the padding log.
    #[arg(long)]
    pub only_pad: bool,

    /// Padding log of a canonical run to import instead of balancing.
    #[arg(long)]
    pub import_padding: Option<PathBuf>,

    /// Previously exported architecture whose switch delays are reused.
    #[arg(long)]
    pub inherit_delays: Option<PathBuf>,

    /// Sampling policy for delay characterization, 0 to 3.
    #[arg(short, long)]
    pub robustness: Option<u8>,

    /// Maximum number of concurrent simulator invocations.
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Directory receiving the generated files.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Gzip the routing-resource graph.
    #[arg(long)]
    pub compress: bool,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a configuration file.
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Enumerate(ref args) => enumerate::run(args, &global),
        Command::Generate(ref args) => generate::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            match e.downcast_ref::<SynthesisError>() {
                Some(err) => eprintln!("error: {}: {}", err.phase(), err.reason()),
                None => eprintln!("error: {e}"),
            }
            process::exit(1);
        }
    }
}
