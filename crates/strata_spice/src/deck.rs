//! SPICE deck rendering.
//!
//! Wires are RC ladders sized from the process node; multiplexers are
//! arrays of transmission gates whose conduction pattern follows the
//! load state. Delays are measured from the 50% crossing of the input
//! pulse to the 50% crossing at the target, for both edges.

use crate::net::{Layer, MeasurementNet, MuxState, SOURCE, TARGET};
use std::collections::{BTreeMap, BTreeSet};
use strata_common::{SynthResult, SynthesisError};
use strata_config::{Cluster, DriverStrength, TechNode};
use strata_layout::mux_dimensions;

/// Which circuit a deck exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckKind {
    /// A routing wire driven by its switch-block mux and buffer.
    Wire {
        /// Number of taps whose arrival is measured separately.
        taps: u32,
    },
    /// A LUT output driving the switch-block muxes of its slot.
    LutAccess,
}

/// Process and cluster parameters shared by every deck.
#[derive(Debug, Clone, Copy)]
pub struct DeckParams<'a> {
    /// Process node.
    pub tech: &'a TechNode,
    /// Cluster shape.
    pub cluster: &'a Cluster,
    /// Transistor model library path.
    pub model_library: &'a str,
    /// Driver of the measured wire.
    pub driver: DriverStrength,
}

/// Names of the measurements a deck of `kind` reports.
pub fn measure_names(kind: DeckKind) -> Vec<String> {
    let mut names = vec!["tfall".to_string(), "trise".to_string()];
    match kind {
        DeckKind::Wire { taps } => {
            for tap in 0..taps {
                names.push(format!("tfall_tap_{tap}"));
                names.push(format!("trise_tap_{tap}"));
            }
        }
        DeckKind::LutAccess => {
            names.push("tfall_ble_mux".to_string());
            names.push("trise_ble_mux".to_string());
        }
    }
    names
}

fn wire_subckt(name: &str, cap: &str, res: &str, stages: u32) -> String {
    let mut out = format!(".SUBCKT {name} n_in n_out l=1\n");
    let stages = stages.max(1);
    let mut from = "n_in".to_string();
    for stage in 0..stages {
        let to = if stage + 1 == stages {
            "n_out".to_string()
        } else {
            format!("n_out{stage}")
        };
        out.push_str(&format!("C{stage}_1 {from} gnd C='l*{cap}/(2*{stages})'\n"));
        out.push_str(&format!("R{stage}_1 {from} {to} R='l*{res}/{stages}'\n"));
        out.push_str(&format!("C{stage}_2 {to} gnd C='l*{cap}/(2*{stages})'\n"));
        from = to;
    }
    out.push_str(".ENDS\n\n");
    out
}

const GATES: &str = "\
.SUBCKT buf n_in n_out vdd strength0=D0 strength1=D1
MN1 n_mid n_in gnd gnd nmos L=gl nfin=strength0
MP1 n_mid n_in vdd vdd pmos L=gl nfin=strength0
MN2 n_out_pre_via n_mid gnd gnd nmos L=gl nfin=strength1
MP2 n_out_pre_via n_mid vdd vdd pmos L=gl nfin=strength1
R_out_via n_out_pre_via n_out R=Rvia
.ENDS

.SUBCKT tg_on n_in n_out vdd
MN1 n_in vdd n_out gnd nmos L=gl nfin=1
MP1 n_in gnd n_out vdd pmos L=gl nfin=1
.ENDS

.SUBCKT tg_off n_in n_out vdd
MN1 n_in gnd n_out gnd nmos L=gl nfin=1
MP1 n_in vdd n_out vdd pmos L=gl nfin=1
.ENDS

";

fn mux_model_name(rows: u32, cols: u32, state: MuxState) -> String {
    format!("mux_{rows}_{cols}_{}", state.name())
}

/// The three state variants of one `rows × cols` transmission-gate array.
fn mux_subckts(rows: u32, cols: u32) -> String {
    let mut out = String::new();
    for state in [MuxState::On, MuxState::Off, MuxState::Partial] {
        out.push_str(&format!(".SUBCKT {} n_in n_out vdd\n", mux_model_name(rows, cols, state)));
        out.push_str("R_in_via n_in n_in_post_via R=Rvia\n");
        for r in 0..rows {
            let row = format!("n_r_{r}");
            for c in 0..cols {
                let ind = r * cols + c;
                let input = if ind == 0 {
                    "n_in_post_via".to_string()
                } else {
                    format!("n_dummy_{ind}")
                };
                let gate = if c == 0 && state != MuxState::Off { "tg_on" } else { "tg_off" };
                out.push_str(&format!("Xtg_{ind} {input} {row} vdd {gate}\n"));
            }
            let gate = if r == 0 && state == MuxState::On { "tg_on" } else { "tg_off" };
            out.push_str(&format!("Xtg_row_{r} {row} n_out vdd {gate}\n"));
        }
        out.push_str(".ENDS\n\n");
    }
    out
}

fn measure(out: &mut String, suffix: &str, trig: &str, targ: &str) {
    for edge in ["fall", "rise"] {
        let cross = edge.to_uppercase();
        out.push_str(&format!(
            ".MEASURE t{edge}{suffix} TRIG V(n_{trig}) VAL='supply_v/2' {cross}=2\n\
             +                TARG V(n_{targ}) VAL='supply_v/2' {cross}=2\n\n"
        ));
    }
}

/// Renders the deck measuring `net`.
///
/// Fails if the net lacks the points its kind requires or a load cannot
/// be laid out as a transmission-gate array.
pub fn render_deck(net: &MeasurementNet, kind: DeckKind, params: &DeckParams<'_>) -> SynthResult<String> {
    let tech = params.tech;
    let cluster = params.cluster;
    let max_height = cluster.lut_height;
    let missing = |label: &str| SynthesisError::measurement(format!("measurement net has no '{label}' point"));
    if !net.contains(TARGET) {
        return Err(missing(TARGET));
    }

    let mut dims: BTreeMap<String, (u32, u32, MuxState)> = BTreeMap::new();
    for node in net.nodes() {
        if let Some(mux) = node.mux {
            let (rows, cols) = mux_dimensions(mux.size, max_height)?;
            dims.insert(node.label.clone(), (rows, cols, mux.state));
        }
    }
    let models: BTreeSet<String> = dims.values().map(|(r, c, _)| mux_subckts(*r, *c)).collect();

    let mut out = String::from(".TITLE GLOBAL_WIRE_MEAS\n\n");
    out.push_str(&format!(".LIB \"{}\" {}_FINFET_HP\n", params.model_library, tech.name.to_uppercase()));
    out.push_str(".TRAN 0.1p 16n\n.OPTIONS BRIEF=1\n\n");
    out.push_str(&format!(".PARAM Cw={:e}\n", tech.mx_c * 1e-15 / 1000.0));
    out.push_str(&format!(".PARAM Rw={:e}\n", tech.mx_r / 1000.0));
    out.push_str(&format!(".PARAM Cwy={:e}\n", tech.my_c * 1e-15 / 1000.0));
    out.push_str(&format!(".PARAM Rwy={:e}\n", tech.my_r / 1000.0));
    out.push_str(&format!(".PARAM Rvia={}\n", tech.via_r));
    out.push_str(&format!(".PARAM D0={}\n", params.driver.d0));
    out.push_str(&format!(".PARAM D1={}\n", params.driver.d1));
    out.push_str(&format!(".PARAM gl={}n\n", tech.gate_length.round() as i64));
    out.push_str(&format!(".PARAM supply_v={}\n\n", tech.supply_v));

    out.push_str(&wire_subckt("wire", "Cw", "Rw", 1));
    let spine_stages = cluster.n * cluster.lut_scale();
    out.push_str(&wire_subckt("my_wire", "Cwy", "Rwy", spine_stages));
    out.push_str(GATES);
    for model in &models {
        out.push_str(model);
    }

    out.push_str("Vps vdd gnd supply_v\n");
    out.push_str("Vin n_in gnd PULSE (0 supply_v 0 0 0 2n 4n)\n\n");

    let lut_access = kind == DeckKind::LutAccess;
    if lut_access {
        out.push_str("Xtg_drv_mux_2_1 n_in n_in_mux vdd tg_on\n");
        out.push_str("Xbuf_drv n_in_mux n_wire_s vdd buf\n\n");
        out.push_str("Xbuf_local n_in_mux n_local_drv vdd buf\n\n");
    } else {
        let &(rows, cols, state) = dims.get(SOURCE).ok_or_else(|| missing(SOURCE))?;
        out.push_str(&format!(
            "Xdriver_mux n_in n_in_drv vdd {}\n",
            mux_model_name(rows, cols, state)
        ));
        out.push_str("Xbuf_drv n_in_drv n_s vdd buf\n\n");
        if let (Some(s), Some(t)) = (net.node("wire_s"), net.node("wire_t")) {
            out.push_str(&format!(
                "Xwire_spine n_wire_s n_wire_t_pre_via my_wire L={:.2}\n",
                length_nm(s.coords, t.coords, tech)
            ));
            out.push_str("Rvia_spine_out n_wire_t_pre_via n_wire_t R=Rvia\n\n");
        }
    }

    let mut edges: Vec<_> = net.edges().iter().collect();
    edges.sort_by(|a, b| (&a.a, &a.b).cmp(&(&b.a, &b.b)));
    for (e, edge) in edges.iter().enumerate() {
        if !lut_access && edge.a.contains("wire") && edge.b.contains("wire") {
            continue;
        }
        let (Some(a), Some(b)) = (net.node(&edge.a), net.node(&edge.b)) else {
            continue;
        };
        let model = match edge.layer {
            Layer::Mx => "wire",
            Layer::My => "my_wire",
        };
        out.push_str(&format!(
            "Xwire{e} n_{} n_{} {model} L={:.2}\n",
            edge.a,
            edge.b,
            length_nm(a.coords, b.coords, tech)
        ));
    }
    out.push('\n');
    for (m, (label, (rows, cols, state))) in dims.iter().filter(|(l, _)| l.as_str() != SOURCE).enumerate() {
        out.push_str(&format!(
            "Xmux{m} n_{label} n_dummy_mux_out{m} vdd {}\n",
            mux_model_name(*rows, *cols, *state)
        ));
    }
    out.push('\n');

    measure(&mut out, "", "in", TARGET);
    match kind {
        DeckKind::LutAccess => measure(&mut out, "_ble_mux", "in", "in_mux"),
        DeckKind::Wire { taps } => {
            for tap in 0..taps {
                let trig = if tap == 0 { "in".to_string() } else { format!("tap_{}_s", tap - 1) };
                let targ = if tap + 1 == taps { TARGET.to_string() } else { format!("tap_{tap}_s") };
                measure(&mut out, &format!("_tap_{tap}"), &trig, &targ);
            }
        }
    }
    out.push_str(".END\n");
    Ok(out)
}

/// Manhattan length in nanometres between two (fin, gate) pitch points.
fn length_nm(a: (f64, f64), b: (f64, f64), tech: &TechNode) -> f64 {
    (a.1 - b.1).abs() * tech.gate_pitch + (a.0 - b.0).abs() * tech.fin_pitch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{lattice, Fuse, Load, MuxLoad};
    use strata_config::SynthesisConfig;

    fn setup() -> (Cluster, TechNode) {
        let config = SynthesisConfig::default();
        (Cluster::from_config(&config), config.technology().unwrap())
    }

    fn horizontal_net() -> MeasurementNet {
        let loads = [
            Load {
                label: "t0".to_string(),
                pin: (-12.0, 4.0),
                size: 16,
            },
            Load {
                label: TARGET.to_string(),
                pin: (-40.0, 10.0),
                size: 9,
            },
        ];
        let mut net = lattice(&loads, "wire_t", (-26.0, 7.0), "", Fuse::Median);
        let mut driver = MuxLoad::new(20);
        driver.state = MuxState::On;
        driver.potential_target = false;
        net.add_node(SOURCE, (0.0, 5.0), Some(driver));
        net.add_node("wire_s", (0.0, 24.0), None);
        net.add_edge(SOURCE, "wire_s", Layer::My);
        net.add_edge("wire_s", "wire_t", Layer::My);
        net
    }

    fn render(net: &MeasurementNet, kind: DeckKind) -> String {
        let (cluster, tech) = setup();
        let params = DeckParams {
            tech: &tech,
            cluster: &cluster,
            model_library: "models/f4.lib",
            driver: DriverStrength::new(3, 8),
        };
        render_deck(net, kind, &params).unwrap()
    }

    #[test]
    fn wire_deck_structure() {
        let deck = render(&horizontal_net(), DeckKind::Wire { taps: 0 });
        assert!(deck.starts_with(".TITLE GLOBAL_WIRE_MEAS\n"));
        assert!(deck.contains(".LIB \"models/f4.lib\" F4_FINFET_HP"));
        assert!(deck.contains(".PARAM D0=3\n.PARAM D1=8\n"));
        assert!(deck.contains(".PARAM gl=14n"));
        assert!(deck.contains("Xdriver_mux n_in n_in_drv vdd mux_4_5_on"));
        assert!(deck.contains("Xwire_spine n_wire_s n_wire_t_pre_via my_wire"));
        // the spine replaces the direct wire-to-wire edge
        assert!(!deck.contains("n_wire_s n_wire_t my_wire"));
        assert!(deck.contains("n_s n_wire_s my_wire"));
        assert!(deck.contains(".MEASURE tfall TRIG V(n_in)"));
        assert!(deck.contains("TARG V(n_t) VAL='supply_v/2' RISE=2"));
        assert!(deck.trim_end().ends_with(".END"));
    }

    #[test]
    fn every_load_is_instantiated_once() {
        let deck = render(&horizontal_net(), DeckKind::Wire { taps: 0 });
        assert_eq!(deck.matches("Xmux").count(), 2);
        assert_eq!(deck.matches(" n_t0 n_dummy_mux_out").count(), 1);
        assert_eq!(deck.matches(" n_t n_dummy_mux_out").count(), 1);
        // each distinct array shape is defined once per state
        assert_eq!(deck.matches(".SUBCKT mux_4_4_off").count(), 1);
        assert_eq!(deck.matches(".SUBCKT mux_3_3_partial").count(), 1);
    }

    #[test]
    fn wire_lengths_are_manhattan_nanometres() {
        let (_, tech) = setup();
        // 19 gate pitches, no horizontal move
        assert_eq!(length_nm((0.0, 5.0), (0.0, 24.0), &tech), 19.0 * 45.0);
        let deck = render(&horizontal_net(), DeckKind::Wire { taps: 0 });
        assert!(deck.contains("n_s n_wire_s my_wire L=855.00"));
    }

    #[test]
    fn spine_ladder_has_one_stage_per_lut4() {
        let deck = render(&horizontal_net(), DeckKind::Wire { taps: 0 });
        // k6n8: 8 slots of 4 LUT4s
        assert!(deck.contains("C31_2 n_out gnd C='l*Cwy/(2*32)'"));
        assert!(!deck.contains("C32_1"));
    }

    #[test]
    fn tap_measures_chain() {
        let mut net = horizontal_net();
        net.add_node("tap_0_s", (0.0, 30.0), None);
        net.add_node("tap_1_s", (0.0, 40.0), None);
        let deck = render(&net, DeckKind::Wire { taps: 2 });
        assert!(deck.contains(".MEASURE tfall_tap_0 TRIG V(n_in)"));
        assert!(deck.contains("TARG V(n_tap_0_s)"));
        assert!(deck.contains(".MEASURE trise_tap_1 TRIG V(n_tap_0_s)"));
    }

    #[test]
    fn lut_access_deck_measures_ble_mux() {
        let loads = [Load {
            label: TARGET.to_string(),
            pin: (-20.0, 10.0),
            size: 12,
        }];
        let net = lattice(&loads, "wire_s", (80.0, 24.0), "", Fuse::Nearest(80.0));
        let deck = render(&net, DeckKind::LutAccess);
        assert!(deck.contains("Xtg_drv_mux_2_1 n_in n_in_mux vdd tg_on"));
        assert!(deck.contains("n_wire_s n_junction_0 wire"));
        assert!(deck.contains(".MEASURE tfall_ble_mux TRIG V(n_in)"));
        assert!(deck.contains("TARG V(n_in_mux)"));
        assert!(!deck.contains("Xdriver_mux"));
    }

    #[test]
    fn missing_driver_is_a_measurement_error() {
        let (cluster, tech) = setup();
        let params = DeckParams {
            tech: &tech,
            cluster: &cluster,
            model_library: "lib",
            driver: DriverStrength::default(),
        };
        let loads = [Load {
            label: TARGET.to_string(),
            pin: (0.0, 0.0),
            size: 4,
        }];
        let net = lattice(&loads, "wire_t", (0.0, 0.0), "", Fuse::Median);
        let err = render_deck(&net, DeckKind::Wire { taps: 0 }, &params).unwrap_err();
        assert!(matches!(err, SynthesisError::Measurement(_)));
    }

    #[test]
    fn measure_name_lists() {
        assert_eq!(measure_names(DeckKind::Wire { taps: 0 }), vec!["tfall", "trise"]);
        assert_eq!(measure_names(DeckKind::Wire { taps: 2 }).len(), 6);
        assert!(measure_names(DeckKind::LutAccess).contains(&"trise_ble_mux".to_string()));
    }
}
