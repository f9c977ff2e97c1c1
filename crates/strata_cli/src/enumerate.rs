//! `strata enumerate`: list every feasible channel composition.

use std::path::Path;

use strata_channel::{Enumerator, FeasibleComposition};
use strata_common::SynthesisError;
use strata_config::Cluster;

use crate::pipeline::{apply_cluster, load_settings};
use crate::{EnumerateArgs, GlobalArgs};

/// Runs the `strata enumerate` command.
pub fn run(args: &EnumerateArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = load_settings(global)?;
    apply_cluster(&mut config, &args.cluster)?;
    let cluster = Cluster::from_config(&config);
    let tech = config.technology().map_err(SynthesisError::from)?;

    if !global.quiet {
        eprintln!(
            " Enumerating K={} N={} on {}",
            cluster.k, cluster.n, config.architecture.tech
        );
    }

    let feasible = Enumerator::new(cluster, tech).enumerate();

    match &args.output_dir {
        Some(dir) => {
            write_all(dir, &config.architecture.name, &feasible)?;
            if !global.quiet {
                eprintln!(
                    "     Wrote {} compositions to {}",
                    feasible.len(),
                    dir.display()
                );
            }
        }
        None => {
            for (index, candidate) in feasible.iter().enumerate() {
                println!("{}", render(index, candidate));
            }
            if !global.quiet {
                eprintln!("     Found {} compositions", feasible.len());
            }
        }
    }
    Ok(0)
}

/// Renders one composition as a `.wire` file with its padding estimate.
fn render(index: usize, candidate: &FeasibleComposition) -> String {
    let mut text = String::new();
    text.push_str(&format!(
        "# composition {index}: padding estimate H1 {} V1 {}\n",
        candidate.horizontal_padding, candidate.vertical_padding
    ));
    text.push_str(&candidate.composition.to_wire_file());
    text
}

fn write_all(
    dir: &Path,
    name: &str,
    feasible: &[FeasibleComposition],
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    for (index, candidate) in feasible.iter().enumerate() {
        let path = dir.join(format!("{name}_{index:04}.wire"));
        std::fs::write(&path, render(index, candidate))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_channel::Composition;

    fn candidate() -> FeasibleComposition {
        FeasibleComposition {
            composition: Composition::parse("H 2 1\nV 4 2\n").unwrap(),
            horizontal_padding: 3,
            vertical_padding: 0,
        }
    }

    #[test]
    fn rendered_file_parses_back() {
        let text = render(7, &candidate());
        assert!(text.starts_with("# composition 7: padding estimate H1 3 V1 0\n"));
        assert_eq!(Composition::parse(&text).unwrap(), candidate().composition);
    }

    #[test]
    fn one_file_per_composition() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("wires");
        write_all(&out, "k6n8", &[candidate(), candidate()]).unwrap();
        assert!(out.join("k6n8_0000.wire").is_file());
        assert!(out.join("k6n8_0001.wire").is_file());
        assert!(!out.join("k6n8_0002.wire").exists());
    }
}
