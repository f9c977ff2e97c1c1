//! Process-node constants.
//!
//! Presets carry nominal values for the supported nodes. Any field can be
//! replaced by giving a complete `[tech]` table in `strata.toml`.

use serde::{Deserialize, Serialize};

/// Names of the built-in process-node presets.
pub const PRESET_NAMES: [&str; 6] = ["F16", "F7", "F5", "F4", "F3a", "F3b"];

/// Geometric and electrical constants of one process node.
///
/// Pitches and gate length are in nanometres, wire resistance in Ω/µm,
/// wire capacitance in fF/µm and the via resistance in Ω.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechNode {
    /// Preset or user-chosen node name.
    pub name: String,
    /// Contacted gate pitch.
    pub gate_pitch: f64,
    /// Fin pitch.
    pub fin_pitch: f64,
    /// Drawn gate length.
    pub gate_length: f64,
    /// Nominal supply voltage in volts.
    pub supply_v: f64,
    /// Pitch of the horizontal-running local metal (Mx).
    pub mx_pitch: f64,
    /// Pitch of the intermediate metal carrying routing wires (My).
    pub my_pitch: f64,
    /// Mx resistance.
    pub mx_r: f64,
    /// Mx capacitance.
    pub mx_c: f64,
    /// My resistance.
    pub my_r: f64,
    /// My capacitance.
    pub my_c: f64,
    /// Resistance of a stacked via from Mx to My.
    pub via_r: f64,
    /// Longest horizontal wire the enumerator considers.
    pub max_h_span: u32,
    /// Longest vertical wire the enumerator considers.
    pub max_v_span: u32,
}

impl TechNode {
    /// Returns the preset for a node name, if one exists.
    pub fn preset(name: &str) -> Option<Self> {
        #[rustfmt::skip]
        let (gp, fp, gl, vdd, mx, my, mx_r, mx_c, my_r, my_c, via, h_span) = match name {
            "F16" => (90.0, 48.0, 20.0, 0.85, 64.0, 80.0,  18.0, 0.20, 10.0, 0.20, 30.0, 8),
            "F7"  => (57.0, 30.0, 18.0, 0.75, 40.0, 76.0,  57.0, 0.20, 18.0, 0.20, 40.0, 8),
            "F5"  => (48.0, 28.0, 16.0, 0.70, 38.0, 72.0,  70.0, 0.19, 22.0, 0.20, 45.0, 8),
            "F4"  => (45.0, 24.0, 14.0, 0.70, 26.0, 50.0, 140.0, 0.18, 45.0, 0.19, 50.0, 4),
            "F3a" => (42.0, 22.0, 12.0, 0.70, 22.0, 48.0, 200.0, 0.17, 50.0, 0.18, 60.0, 4),
            "F3b" => (42.0, 22.0, 12.0, 0.70, 22.0, 80.0, 200.0, 0.17, 15.0, 0.20, 60.0, 8),
            _ => return None,
        };
        Some(Self {
            name: name.to_string(),
            gate_pitch: gp,
            fin_pitch: fp,
            gate_length: gl,
            supply_v: vdd,
            mx_pitch: mx,
            my_pitch: my,
            mx_r,
            mx_c,
            my_r,
            my_c,
            via_r: via,
            max_h_span: h_span,
            max_v_span: 16,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_resolves() {
        for name in PRESET_NAMES {
            let node = TechNode::preset(name).unwrap();
            assert_eq!(node.name, name);
            assert!(node.gate_pitch > node.fin_pitch);
        }
    }

    #[test]
    fn short_horizontal_span_on_f4_and_f3a() {
        assert_eq!(TechNode::preset("F4").unwrap().max_h_span, 4);
        assert_eq!(TechNode::preset("F3a").unwrap().max_h_span, 4);
        assert_eq!(TechNode::preset("F3b").unwrap().max_h_span, 8);
    }

    #[test]
    fn my_pitches_match_node_table() {
        let pitches: Vec<f64> = PRESET_NAMES
            .iter()
            .map(|n| TechNode::preset(n).unwrap().my_pitch)
            .collect();
        assert_eq!(pitches, vec![80.0, 76.0, 72.0, 50.0, 48.0, 80.0]);
    }

    #[test]
    fn unknown_preset() {
        assert!(TechNode::preset("N2").is_none());
    }
}
