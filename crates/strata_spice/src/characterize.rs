//! Delay characterization of every wire type of a balanced architecture.
//!
//! Characterization runs in three stages. Planning builds every net and
//! renders its deck on the calling thread. Dispatch hands decks and
//! local-wire queries to the simulator on a worker pool bounded by the
//! configured job limit. Aggregation averages the listings per wire type
//! into a [`DelayRecord`].

use crate::deck::{measure_names, render_deck, DeckKind, DeckParams};
use crate::net::{MeasurementNet, TARGET};
use crate::netlist::NetBuilder;
use crate::simulator::{parse_listing, CircuitSimulator, LocalWireQuery, SimulationJob};
use rayon::prelude::*;
use std::collections::BTreeMap;
use strata_common::{Axis, DelayRecord, SynthResult, SynthesisError, WireClass, CB_SWITCH};
use strata_config::{Cluster, SynthesisConfig, TechNode};
use strata_layout::BalancedArchitecture;
use strata_rrg::WireNode;
use tracing::{debug, info, warn};

/// Delay of the BLE output mux.
pub const BLE_MUX: &str = "ble_mux";

/// Delay from a LUT output onto the routing, BLE mux excluded.
pub const LUT_ACCESS: &str = "lut_access";

#[derive(Debug, Clone, PartialEq)]
enum Aggregate {
    Horizontal { length: u32, jobs: Vec<usize> },
    Vertical { length: u32, jobs: Vec<usize> },
    LutAccess { job: usize },
}

/// Everything to simulate for one architecture.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterizationPlan {
    /// Decks, one per sampled net.
    pub jobs: Vec<SimulationJob>,
    /// Connection-block queries keyed by the record entry they fill.
    pub queries: Vec<(String, LocalWireQuery)>,
    aggregates: Vec<Aggregate>,
}

/// Plans, dispatches and aggregates the delay measurements.
pub struct Characterizer<'a> {
    config: &'a SynthesisConfig,
    arch: &'a BalancedArchitecture,
    cluster: &'a Cluster,
    tech: &'a TechNode,
}

impl<'a> Characterizer<'a> {
    /// Creates a characterizer.
    pub fn new(
        config: &'a SynthesisConfig,
        arch: &'a BalancedArchitecture,
        cluster: &'a Cluster,
        tech: &'a TechNode,
    ) -> Self {
        Self {
            config,
            arch,
            cluster,
            tech,
        }
    }

    fn builder(&self) -> NetBuilder<'a> {
        NetBuilder::new(self.arch, self.cluster, self.tech, self.config.pattern.separate_taps)
    }

    fn level(&self) -> u8 {
        self.config.characterization.robustness_level
    }

    /// Sources sampled for one wire type under the robustness level.
    fn sources(&self, builder: &NetBuilder<'_>, axis: Axis, length: u32) -> SynthResult<Vec<WireNode>> {
        let sources = match self.level() {
            0 => builder.candidate_sources(axis, length).into_iter().take(1).collect(),
            1 => median(builder.ranked_sources(axis, length)).into_iter().collect(),
            _ => builder.ranked_sources(axis, length),
        };
        if sources.is_empty() {
            return Err(SynthesisError::measurement(format!(
                "no placed {}{length} wire to characterize",
                axis.letter()
            )));
        }
        Ok(sources)
    }

    /// The representative source used for connection-block queries.
    fn representative(&self, builder: &NetBuilder<'_>, axis: Axis, length: u32) -> Option<WireNode> {
        if self.level() == 0 {
            builder.candidate_sources(axis, length).into_iter().next()
        } else {
            median(builder.ranked_sources(axis, length))
        }
    }

    /// The net itself plus, at the exhaustive level, one variant per
    /// alternative target.
    fn variants(&self, net: MeasurementNet) -> Vec<MeasurementNet> {
        let mut out = Vec::new();
        if self.level() >= 3 {
            for (round, label) in net
                .potential_targets()
                .into_iter()
                .filter(|l| l != TARGET)
                .enumerate()
            {
                out.push(net.retargeted(&label, round));
            }
        }
        out.insert(0, net);
        out
    }

    fn deck_params(&self, driver: strata_config::DriverStrength) -> DeckParams<'_> {
        DeckParams {
            tech: self.tech,
            cluster: self.cluster,
            model_library: &self.config.characterization.model_library,
            driver,
        }
    }

    /// Builds every net and renders its deck.
    pub fn plan(&self) -> SynthResult<CharacterizationPlan> {
        let builder = self.builder();
        let drivers = &self.config.drivers;
        let name = &self.config.architecture.name;
        let mut plan = CharacterizationPlan {
            jobs: Vec::new(),
            queries: Vec::new(),
            aggregates: Vec::new(),
        };

        for axis in [Axis::Horizontal, Axis::Vertical] {
            let lengths: Vec<u32> = self
                .arch
                .composition
                .channel(axis)
                .populated()
                .map(|(l, _)| l)
                .collect();
            for &length in &lengths {
                let (kind, driver) = match axis {
                    Axis::Horizontal => (DeckKind::Wire { taps: 0 }, drivers.horizontal(length)),
                    Axis::Vertical => (
                        DeckKind::Wire {
                            taps: self.cluster.tap_count,
                        },
                        drivers.vertical(length),
                    ),
                };
                let params = self.deck_params(driver);
                let mut jobs = Vec::new();
                for source in self.sources(&builder, axis, length)? {
                    let wire = builder.wire_net(&source)?;
                    for net in self.variants(wire.net) {
                        let job = plan.jobs.len();
                        plan.jobs.push(SimulationJob {
                            name: format!("{name}_{}{length}_{job}", axis.letter()),
                            deck: render_deck(&net, kind, &params)?,
                            measures: measure_names(kind),
                        });
                        jobs.push(job);
                    }
                }
                debug!(wire = %format!("{}{length}", axis.letter()), decks = jobs.len(), "planned wire");
                plan.aggregates.push(match axis {
                    Axis::Horizontal => Aggregate::Horizontal { length, jobs },
                    Axis::Vertical => Aggregate::Vertical { length, jobs },
                });
            }

            if let Some(&longest) = lengths.last() {
                self.plan_connection_block(&builder, axis, longest, &mut plan)?;
            }
        }

        let net = builder.lut_access_net()?;
        let params = self.deck_params(drivers.local);
        let job = plan.jobs.len();
        plan.jobs.push(SimulationJob {
            name: format!("{name}_lut_access"),
            deck: render_deck(&net, DeckKind::LutAccess, &params)?,
            measures: measure_names(DeckKind::LutAccess),
        });
        plan.aggregates.push(Aggregate::LutAccess { job });
        Ok(plan)
    }

    fn plan_connection_block(
        &self,
        builder: &NetBuilder<'_>,
        axis: Axis,
        length: u32,
        plan: &mut CharacterizationPlan,
    ) -> SynthResult<()> {
        let key = match axis {
            Axis::Horizontal => "cb_h",
            Axis::Vertical => "cb_v",
        };
        let Some(source) = self.representative(builder, axis, length) else {
            return Ok(());
        };
        let wire = builder.wire_net(&source)?;
        let (Some(cb), Some(wire_x)) = (wire.connection, wire.target_x()) else {
            warn!(wire = %format!("{}{length}", axis.letter()), "wire feeds no connection block, skipped for cb delay");
            return Ok(());
        };
        let arch = &self.config.architecture;
        plan.queries.push((
            key.to_string(),
            LocalWireQuery {
                wire: format!("{}{length}", axis.letter()),
                k: self.cluster.k,
                n: self.cluster.n,
                tech: self.tech.name.clone(),
                density: arch.density,
                wire_x,
                cb_x: cb.center_x,
                cb_size: cb.size,
            },
        ));
        Ok(())
    }

    /// Plans, simulates and aggregates every delay.
    pub fn run(&self, simulator: &dyn CircuitSimulator) -> SynthResult<DelayRecord> {
        let plan = self.plan()?;
        let threads = self.config.characterization.jobs.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| SynthesisError::measurement(format!("cannot start simulation pool: {e}")))?;
        info!(decks = plan.jobs.len(), queries = plan.queries.len(), threads, "characterizing");

        let listings = pool.install(|| {
            plan.jobs
                .par_iter()
                .map(|job| {
                    let listing = simulator.simulate(job)?;
                    parse_listing(&job.name, &listing, &job.measures)
                })
                .collect::<SynthResult<Vec<_>>>()
        })?;
        let local = pool.install(|| {
            plan.queries
                .par_iter()
                .map(|(key, query)| simulator.local_wire_delay(query).map(|d| (key.clone(), d)))
                .collect::<SynthResult<Vec<_>>>()
        })?;
        self.aggregate(&plan, &listings, &local)
    }

    fn aggregate(
        &self,
        plan: &CharacterizationPlan,
        listings: &[BTreeMap<String, f64>],
        local: &[(String, f64)],
    ) -> SynthResult<DelayRecord> {
        let both = |job: usize, suffix: &str| -> SynthResult<f64> {
            let listing = listings
                .get(job)
                .ok_or_else(|| SynthesisError::measurement(format!("no listing for deck {job}")))?;
            let mut sum = 0.0;
            for edge in ["tfall", "trise"] {
                let name = format!("{edge}{suffix}");
                sum += listing.get(&name).copied().ok_or_else(|| {
                    SynthesisError::measurement(format!("deck {job} reports no {name}"))
                })?;
            }
            Ok(0.5 * sum)
        };
        let averaged = |jobs: &[usize], suffix: &str| -> SynthResult<f64> {
            let delays = jobs
                .iter()
                .map(|&j| both(j, suffix))
                .collect::<SynthResult<Vec<_>>>()?;
            Ok(mean(delays.into_iter()))
        };
        let mut record = DelayRecord::new();
        for aggregate in &plan.aggregates {
            match aggregate {
                Aggregate::Horizontal { length, jobs } => {
                    record.insert(WireClass::horizontal(*length).name(), averaged(jobs, "")?);
                }
                Aggregate::Vertical { length, jobs } => {
                    if self.config.pattern.separate_taps {
                        for tap in 0..self.cluster.tap_count {
                            let delay = averaged(jobs, &format!("_tap_{tap}"))?;
                            record.insert(WireClass::vertical(*length, tap).name(), delay);
                        }
                        // whole wire, keyed without a tap
                        let whole = WireClass {
                            tap: None,
                            ..WireClass::vertical(*length, 0)
                        };
                        record.insert(whole.name(), averaged(jobs, "")?);
                    } else {
                        record.insert(WireClass::vertical(*length, 0).name(), averaged(jobs, "")?);
                    }
                }
                Aggregate::LutAccess { job } => {
                    let ble_mux = both(*job, "_ble_mux")?;
                    record.insert(BLE_MUX, ble_mux);
                    record.insert(LUT_ACCESS, both(*job, "")? - ble_mux);
                }
            }
        }

        let mut cb = Vec::new();
        for (key, delay) in local {
            record.insert(key.clone(), *delay);
            cb.push(*delay);
        }
        if cb.is_empty() {
            return Err(SynthesisError::measurement(
                "no wire feeds a connection block, cannot derive the cb delay",
            ));
        }
        record.insert(CB_SWITCH, mean(cb.into_iter()));
        for (name, delay) in record.iter() {
            info!(switch = name, delay_ps = delay * 1e12, "characterized");
        }
        Ok(record)
    }
}

fn median(mut items: Vec<WireNode>) -> Option<WireNode> {
    if items.is_empty() {
        return None;
    }
    let mid = items.len() / 2;
    Some(items.swap_remove(mid))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strata_channel::Composition;
    use strata_layout::Balancer;

    /// Reports fixed delays: every main measure 10p, tap measures 4p,
    /// ble mux 3p, and 7p for connection blocks.
    struct ScriptedSimulator {
        decks: AtomicUsize,
        queries: AtomicUsize,
    }

    impl ScriptedSimulator {
        fn new() -> Self {
            Self {
                decks: AtomicUsize::new(0),
                queries: AtomicUsize::new(0),
            }
        }
    }

    impl CircuitSimulator for ScriptedSimulator {
        fn simulate(&self, job: &SimulationJob) -> SynthResult<String> {
            self.decks.fetch_add(1, Ordering::SeqCst);
            let mut listing = String::from(" **** measure results\n");
            for name in &job.measures {
                let value = if name.ends_with("ble_mux") {
                    "3.0p"
                } else if name.contains("_tap_") {
                    "4.0p"
                } else {
                    "10.0p"
                };
                listing.push_str(&format!(" {name}= {value} targ= 1.0n trig= 1.0n\n"));
            }
            Ok(listing)
        }

        fn local_wire_delay(&self, _query: &LocalWireQuery) -> SynthResult<f64> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(7e-12)
        }
    }

    struct DivergingSimulator;

    impl CircuitSimulator for DivergingSimulator {
        fn simulate(&self, _job: &SimulationJob) -> SynthResult<String> {
            Ok("tfall= -1.0p\ntrise= 2.0p\n".to_string())
        }

        fn local_wire_delay(&self, _query: &LocalWireQuery) -> SynthResult<f64> {
            Ok(1e-12)
        }
    }

    fn config(level: u8) -> SynthesisConfig {
        let mut config = SynthesisConfig::default();
        config.architecture.n = 2;
        config.architecture.name = "k6n2".to_string();
        config.characterization.robustness_level = level;
        config.characterization.jobs = 2;
        config
    }

    fn architecture(config: &SynthesisConfig) -> (BalancedArchitecture, Cluster, TechNode) {
        let balancer = Balancer::new(config).unwrap();
        let composition = Composition::parse("H 2 2\nV 4 1\n")
            .unwrap()
            .scaled_to(balancer.cluster());
        let arch = balancer.evaluate(&composition).unwrap();
        (arch, *balancer.cluster(), balancer.tech().clone())
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-18
    }

    #[test]
    fn record_covers_every_switch() {
        let config = config(1);
        let (arch, cluster, tech) = architecture(&config);
        let simulator = ScriptedSimulator::new();
        let record = Characterizer::new(&config, &arch, &cluster, &tech)
            .run(&simulator)
            .unwrap();
        assert!(close(record.get("H2").unwrap(), 10e-12));
        assert!(close(record.get("V16_tap_0").unwrap(), 10e-12));
        assert!(close(record.get(BLE_MUX).unwrap(), 3e-12));
        assert!(close(record.get(LUT_ACCESS).unwrap(), 7e-12));
        assert!(close(record.get(CB_SWITCH).unwrap(), 7e-12));
        assert!(record.contains("cb_h"));
        assert!(record.contains("cb_v"));
        // one deck per wire type plus the LUT access net
        assert_eq!(simulator.decks.load(Ordering::SeqCst), 3);
        assert_eq!(simulator.queries.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn level_zero_samples_one_source() {
        let config = config(0);
        let (arch, cluster, tech) = architecture(&config);
        let plan = Characterizer::new(&config, &arch, &cluster, &tech).plan().unwrap();
        assert_eq!(plan.jobs.len(), 3);
        assert!(plan.jobs.iter().any(|j| j.name == "k6n2_lut_access"));
    }

    #[test]
    fn level_one_samples_one_deck_per_wire_type() {
        let config = config(1);
        let (arch, cluster, tech) = architecture(&config);
        let characterizer = Characterizer::new(&config, &arch, &cluster, &tech);
        let plan = characterizer.plan().unwrap();
        // H2 median, V16 median, LUT access
        assert_eq!(plan.jobs.len(), 3);
        let names: Vec<&str> = plan.jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, ["k6n2_H2_0", "k6n2_V16_1", "k6n2_lut_access"]);
        // the median is picked from several ranked sources
        let builder = characterizer.builder();
        assert_eq!(builder.ranked_sources(Axis::Horizontal, 2).len(), 4);
        assert_eq!(builder.ranked_sources(Axis::Vertical, 16).len(), 2);
    }

    #[test]
    fn level_two_samples_every_source() {
        let config = config(2);
        let (arch, cluster, tech) = architecture(&config);
        let plan = Characterizer::new(&config, &arch, &cluster, &tech).plan().unwrap();
        // H2: 2 instances x 2 sides; V16: 1 instance x 2 sides; LUT access
        assert_eq!(plan.jobs.len(), 4 + 2 + 1);
        let names: Vec<&str> = plan.jobs.iter().map(|j| j.name.as_str()).collect();
        assert!(names.contains(&"k6n2_H2_0"));
        assert!(names.contains(&"k6n2_V16_4"));
    }

    #[test]
    fn level_three_adds_target_variants() {
        let two = config(2);
        let (arch, cluster, tech) = architecture(&two);
        let base = Characterizer::new(&two, &arch, &cluster, &tech).plan().unwrap();
        let three = config(3);
        let plan = Characterizer::new(&three, &arch, &cluster, &tech).plan().unwrap();
        assert!(plan.jobs.len() > base.jobs.len());
        for job in &plan.jobs {
            assert!(job.deck.contains("TARG V(n_t)"));
        }
    }

    #[test]
    fn separate_taps_report_per_tap_delays() {
        let mut config = config(0);
        config.pattern.separate_taps = true;
        let (arch, cluster, tech) = architecture(&config);
        let record = Characterizer::new(&config, &arch, &cluster, &tech)
            .run(&ScriptedSimulator::new())
            .unwrap();
        for tap in 0..cluster.tap_count {
            let delay = record.get(&format!("V16_tap_{tap}")).unwrap();
            assert!(close(delay, 4e-12));
        }
        assert!(close(record.get("V16").unwrap(), 10e-12));
    }

    #[test]
    fn merged_taps_record_no_whole_wire_key() {
        let config = config(0);
        let (arch, cluster, tech) = architecture(&config);
        let record = Characterizer::new(&config, &arch, &cluster, &tech)
            .run(&ScriptedSimulator::new())
            .unwrap();
        assert!(record.contains("V16_tap_0"));
        assert!(!record.contains("V16"));
    }

    #[test]
    fn negative_delay_aborts() {
        let config = config(0);
        let (arch, cluster, tech) = architecture(&config);
        let err = Characterizer::new(&config, &arch, &cluster, &tech)
            .run(&DivergingSimulator)
            .unwrap_err();
        assert_eq!(err.phase(), "measurement");
    }

    #[test]
    fn median_picks_middle() {
        let wire = |index| WireNode {
            slot: 1,
            side: strata_common::Side::Right,
            length: 2,
            index,
            tap: 0,
        };
        assert_eq!(median(vec![wire(0), wire(1), wire(2)]), Some(wire(1)));
        assert_eq!(median(vec![wire(0), wire(1)]), Some(wire(1)));
        assert_eq!(median(Vec::new()), None);
    }
}
