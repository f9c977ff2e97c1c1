//! The circuit-simulator seam and listing parsing.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use strata_common::{SynthResult, SynthesisError};
use strata_config::CharacterizationConfig;
use tracing::debug;

/// One deck to simulate.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationJob {
    /// Unique deck name, also the file stem.
    pub name: String,
    /// Full deck text.
    pub deck: String,
    /// Measurements the listing must report.
    pub measures: Vec<String>,
}

/// A connection-block delay query for the local-wire model.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalWireQuery {
    /// Wire the connection block hangs on.
    pub wire: String,
    /// LUT size.
    pub k: u32,
    /// Cluster size.
    pub n: u32,
    /// Process node name.
    pub tech: String,
    /// Crossbar density.
    pub density: f64,
    /// Wire position in fin pitches.
    pub wire_x: f64,
    /// Connection-block mux position in fin pitches.
    pub cb_x: f64,
    /// Connection-block mux input count.
    pub cb_size: u32,
}

/// Runs decks and local-wire queries.
///
/// Implementations must be usable from several worker threads at once.
pub trait CircuitSimulator: Sync {
    /// Simulates one deck and returns the raw listing.
    fn simulate(&self, job: &SimulationJob) -> SynthResult<String>;

    /// Returns the delay in seconds through a connection block.
    fn local_wire_delay(&self, query: &LocalWireQuery) -> SynthResult<f64>;
}

/// Drives an external simulator executable.
///
/// Decks are written to the work directory and the simulator's standard
/// output is taken as the listing.
#[derive(Debug, Clone)]
pub struct ProcessSimulator {
    program: String,
    local_wire_command: Option<String>,
    work_dir: PathBuf,
}

impl ProcessSimulator {
    /// Creates a runner from the characterization settings.
    pub fn new(config: &CharacterizationConfig) -> Self {
        Self {
            program: config.simulator.clone(),
            local_wire_command: config.local_wire_command.clone(),
            work_dir: config.work_dir.clone(),
        }
    }

    fn run(command: &mut Command, what: &str) -> SynthResult<String> {
        let output = command.output().map_err(|e| {
            SynthesisError::measurement(format!("cannot launch {what}: {e}"))
        })?;
        if !output.status.success() {
            return Err(SynthesisError::measurement(format!(
                "{what} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl CircuitSimulator for ProcessSimulator {
    fn simulate(&self, job: &SimulationJob) -> SynthResult<String> {
        fs::create_dir_all(&self.work_dir)?;
        let deck = self.work_dir.join(format!("{}.sp", job.name));
        fs::write(&deck, &job.deck)?;
        debug!(deck = %deck.display(), "running simulator");
        let listing = Self::run(
            Command::new(&self.program).arg(&deck),
            &format!("{} on {}", self.program, job.name),
        )?;
        fs::write(self.work_dir.join(format!("{}.lis", job.name)), &listing)?;
        Ok(listing)
    }

    fn local_wire_delay(&self, query: &LocalWireQuery) -> SynthResult<f64> {
        let program = self.local_wire_command.as_deref().ok_or_else(|| {
            SynthesisError::measurement("no local-wire command configured for connection-block delays")
        })?;
        let stdout = Self::run(
            Command::new(program)
                .arg("--K")
                .arg(query.k.to_string())
                .arg("--N")
                .arg(query.n.to_string())
                .arg("--tech")
                .arg(&query.tech)
                .arg("--density")
                .arg(query.density.to_string())
                .arg("--meas_cb")
                .arg(format!("{} {} {}", query.wire_x, query.cb_x, query.cb_size)),
            program,
        )?;
        let last = stdout.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
        let delay: f64 = last.trim().parse().map_err(|_| {
            SynthesisError::measurement(format!(
                "local-wire query for {} returned '{}'",
                query.wire,
                last.trim()
            ))
        })?;
        if delay < 0.0 {
            return Err(SynthesisError::measurement(format!(
                "local-wire query for {} returned a negative delay",
                query.wire
            )));
        }
        Ok(delay)
    }
}

/// Parses a measured value such as `12.34p`, `0.8n` or `1.5e-11`.
///
/// Scaled values are rounded to one decimal of their unit, as the
/// listing prints them.
fn parse_value(text: &str) -> Option<f64> {
    let scale = match text.chars().last()? {
        'f' => 1e-15,
        'p' => 1e-12,
        'n' => 1e-9,
        'u' => 1e-6,
        'm' => 1e-3,
        _ => return text.parse().ok(),
    };
    let mantissa: f64 = text[..text.len() - 1].parse().ok()?;
    Some((mantissa * 10.0).round() / 10.0 * scale)
}

/// Extracts the named measurements from a simulator listing.
///
/// Fails if a measurement is missing, unparsable or negative; a negative
/// delay means the simulation did not converge.
pub fn parse_listing(job: &str, listing: &str, measures: &[String]) -> SynthResult<BTreeMap<String, f64>> {
    let mut found = BTreeMap::new();
    for line in listing.lines() {
        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            let Some((name, rest)) = token.split_once('=') else {
                continue;
            };
            if !measures.iter().any(|m| m == name) || found.contains_key(name) {
                continue;
            }
            let value = if rest.is_empty() {
                tokens.next().unwrap_or("")
            } else {
                rest
            };
            let delay = parse_value(value).ok_or_else(|| {
                SynthesisError::measurement(format!("{job}: cannot read {name} = '{value}'"))
            })?;
            if delay < 0.0 {
                return Err(SynthesisError::measurement(format!(
                    "{job}: negative {name}, the simulation did not converge"
                )));
            }
            found.insert(name.to_string(), delay);
        }
    }
    if let Some(missing) = measures.iter().find(|m| !found.contains_key(*m)) {
        return Err(SynthesisError::measurement(format!(
            "{job}: listing reports no {missing}"
        )));
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-18
    }

    #[test]
    fn parses_scaled_values() {
        let listing = " tfall=  12.34p  targ=  2.0123n   trig=  2.0000n\n trise= 15.06p\n";
        let found = parse_listing("job", listing, &names(&["tfall", "trise"])).unwrap();
        assert!(close(found["tfall"], 12.3e-12));
        assert!(close(found["trise"], 15.1e-12));
    }

    #[test]
    fn tap_measures_do_not_shadow_main() {
        let listing = "tfall_tap_0= 5.0p\ntfall= 9.0p\ntrise= 8.0p\n";
        let found = parse_listing("job", listing, &names(&["tfall", "trise", "tfall_tap_0"])).unwrap();
        assert!(close(found["tfall"], 9.0e-12));
        assert!(close(found["tfall_tap_0"], 5.0e-12));
    }

    #[test]
    fn plain_exponent_values() {
        let found = parse_listing("job", "tfall=1.5e-11\ntrise=2e-11\n", &names(&["tfall", "trise"])).unwrap();
        assert!(close(found["tfall"], 1.5e-11));
    }

    #[test]
    fn negative_delay_is_rejected() {
        let err = parse_listing("h4", "tfall= -3.2p\ntrise= 4.0p\n", &names(&["tfall", "trise"])).unwrap_err();
        assert!(matches!(err, SynthesisError::Measurement(_)));
        assert!(err.to_string().contains("did not converge"));
    }

    #[test]
    fn missing_measure_is_rejected() {
        let err = parse_listing("h4", "tfall= 3.2p\n", &names(&["tfall", "trise"])).unwrap_err();
        assert!(err.to_string().contains("no trise"));
    }

    #[test]
    fn failed_measure_is_rejected() {
        let err = parse_listing("h4", "tfall= failed\ntrise= 1p\n", &names(&["tfall", "trise"])).unwrap_err();
        assert!(err.to_string().contains("cannot read tfall"));
    }

    #[test]
    fn missing_local_wire_command() {
        let runner = ProcessSimulator::new(&CharacterizationConfig::default());
        let query = LocalWireQuery {
            wire: "H4".to_string(),
            k: 6,
            n: 8,
            tech: "F4".to_string(),
            density: 0.5,
            wire_x: 0.0,
            cb_x: -20.0,
            cb_size: 12,
        };
        let err = runner.local_wire_delay(&query).unwrap_err();
        assert!(matches!(err, SynthesisError::Measurement(_)));
    }

    #[test]
    fn missing_simulator_executable() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CharacterizationConfig::default();
        config.simulator = "strata-no-such-simulator".to_string();
        config.work_dir = dir.path().join("sim");
        let runner = ProcessSimulator::new(&config);
        let job = SimulationJob {
            name: "k6n8_H4_0".to_string(),
            deck: ".END\n".to_string(),
            measures: names(&["tfall"]),
        };
        let err = runner.simulate(&job).unwrap_err();
        assert!(err.to_string().contains("cannot launch"));
        // the deck is left behind for inspection
        assert!(dir.path().join("sim/k6n8_H4_0.sp").exists());
    }
}
