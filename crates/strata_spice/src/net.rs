//! Measurement nets: the physical RC network a wire delay is simulated on.
//!
//! A net is a small undirected graph of labelled points in (fin, gate)
//! pitch coordinates. Points that sit on a multiplexer input carry a
//! [`MuxLoad`]; the node labelled `t` is the measured target and `s`
//! the driving multiplexer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strata_common::SynthResult;
use strata_layout::mux_dimensions;

/// Label of the measured target node.
pub const TARGET: &str = "t";

/// Label of the driving multiplexer node.
pub const SOURCE: &str = "s";

/// Loads closer than this many fin pitches share a lattice column.
const COLUMN_THRESHOLD: f64 = 10.0;

/// Metal layer an edge is routed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    /// Local metal, modelled as a single pi stage.
    Mx,
    /// Routing metal, modelled as a distributed ladder.
    My,
}

/// Conduction state of a loading multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MuxState {
    /// Selected input, output stage conducting.
    On,
    /// First column conducting, output blocked.
    Partial,
    /// Only the input via loads the wire.
    Off,
}

impl MuxState {
    /// Suffix of the matching subcircuit name.
    pub fn name(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Partial => "partial",
            Self::Off => "off",
        }
    }
}

/// A multiplexer input hanging on the net.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MuxLoad {
    /// Input count.
    pub size: u32,
    /// Conduction state.
    pub state: MuxState,
    /// Can be swapped in as the measured target.
    pub potential_target: bool,
}

impl MuxLoad {
    /// An off load that may serve as a target.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            state: MuxState::Off,
            potential_target: true,
        }
    }
}

/// One point of a measurement net.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetNode {
    /// Unique label, also the SPICE node suffix.
    pub label: String,
    /// `(x, y)` in (fin, gate) pitches.
    pub coords: (f64, f64),
    /// Multiplexer sitting on this point, if any.
    pub mux: Option<MuxLoad>,
}

/// An undirected edge between two labelled points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetEdge {
    /// First endpoint label.
    pub a: String,
    /// Second endpoint label.
    pub b: String,
    /// Routing layer.
    pub layer: Layer,
}

/// An undirected RC measurement network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementNet {
    nodes: Vec<NetNode>,
    edges: Vec<NetEdge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl MeasurementNet {
    /// Creates an empty net.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a point, or replaces the coordinates and load of an existing one.
    pub fn add_node(&mut self, label: impl Into<String>, coords: (f64, f64), mux: Option<MuxLoad>) {
        let label = label.into();
        match self.index.get(&label) {
            Some(&i) => {
                self.nodes[i].coords = coords;
                self.nodes[i].mux = mux;
            }
            None => {
                self.index.insert(label.clone(), self.nodes.len());
                self.nodes.push(NetNode { label, coords, mux });
            }
        }
    }

    /// Connects two points, creating missing ones at the origin.
    ///
    /// Connecting an already connected pair only updates the layer.
    pub fn add_edge(&mut self, a: &str, b: &str, layer: Layer) {
        for label in [a, b] {
            if !self.index.contains_key(label) {
                self.add_node(label, (0.0, 0.0), None);
            }
        }
        if let Some(edge) = self
            .edges
            .iter_mut()
            .find(|e| (e.a == a && e.b == b) || (e.a == b && e.b == a))
        {
            edge.layer = layer;
            return;
        }
        self.edges.push(NetEdge {
            a: a.to_string(),
            b: b.to_string(),
            layer,
        });
    }

    /// Looks up a point.
    pub fn node(&self, label: &str) -> Option<&NetNode> {
        self.index.get(label).map(|&i| &self.nodes[i])
    }

    /// Looks up a point for modification.
    pub fn node_mut(&mut self, label: &str) -> Option<&mut NetNode> {
        self.index.get(label).map(|&i| &mut self.nodes[i])
    }

    /// Returns `true` if the point exists.
    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Sets the state of a multiplexer load; points without a load are left alone.
    pub fn set_state(&mut self, label: &str, state: MuxState) {
        if let Some(mux) = self.node_mut(label).and_then(|n| n.mux.as_mut()) {
            mux.state = state;
        }
    }

    /// Points in insertion order.
    pub fn nodes(&self) -> &[NetNode] {
        &self.nodes
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[NetEdge] {
        &self.edges
    }

    /// Copies every point and edge of `other` into this net, moving its
    /// points by `shift`.
    pub fn merge(&mut self, other: &MeasurementNet, shift: (f64, f64)) {
        for node in &other.nodes {
            let coords = (node.coords.0 + shift.0, node.coords.1 + shift.1);
            self.add_node(node.label.clone(), coords, node.mux);
        }
        for edge in &other.edges {
            self.add_edge(&edge.a, &edge.b, edge.layer);
        }
    }

    /// Labels of every load that may be swapped in as the target.
    pub fn potential_targets(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.label != SOURCE && n.mux.is_some_and(|m| m.potential_target))
            .map(|n| n.label.clone())
            .collect()
    }

    /// Renames a point and every edge touching it.
    pub fn relabel(&mut self, from: &str, to: &str) {
        let Some(i) = self.index.remove(from) else {
            return;
        };
        self.nodes[i].label = to.to_string();
        self.index.insert(to.to_string(), i);
        for edge in &mut self.edges {
            if edge.a == from {
                edge.a = to.to_string();
            }
            if edge.b == from {
                edge.b = to.to_string();
            }
        }
    }

    /// Returns a copy measuring at `label` instead; the old target is
    /// kept as `prev_t_{round}`.
    pub fn retargeted(&self, label: &str, round: usize) -> Self {
        let mut net = self.clone();
        net.relabel(TARGET, &format!("prev_{TARGET}_{round}"));
        net.relabel(label, TARGET);
        net
    }

    /// Rebuilds the label index after deserialization.
    pub fn reindex(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.label.clone(), i))
            .collect();
    }
}

/// A multiplexer input to be attached to a lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    /// Label of the point.
    pub label: String,
    /// Input pin `(x, y)`.
    pub pin: (f64, f64),
    /// Input count.
    pub size: u32,
}

/// Where the feeding wire joins a lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fuse {
    /// Columns are ordered by distance from `x`; the wire joins the nearest.
    Nearest(f64),
    /// Columns are ordered left to right; the wire joins the median one.
    Median,
}

/// Connects loads through a lattice of vertical columns.
///
/// Loads within a few fin pitches of each other share a column. Every
/// column gets a junction at the anchor height; junctions are chained in
/// column order and the anchor point joins one of them. Inside a column
/// the points are chained bottom to top. All lattice edges are on Mx.
pub fn lattice(loads: &[Load], anchor_label: &str, anchor: (f64, f64), prefix: &str, fuse: Fuse) -> MeasurementNet {
    let mut columns: Vec<(f64, Vec<(f64, String)>)> = Vec::new();
    let mut net = MeasurementNet::new();
    for load in loads {
        net.add_node(load.label.clone(), load.pin, Some(MuxLoad::new(load.size)));
        let entry = (load.pin.1, load.label.clone());
        match columns
            .iter_mut()
            .find(|(x, _)| (load.pin.0 - x).abs() <= COLUMN_THRESHOLD)
        {
            Some((_, members)) => members.push(entry),
            None => columns.push((load.pin.0, vec![entry])),
        }
    }

    let fuse_index = match fuse {
        Fuse::Nearest(from) => {
            columns.sort_by(|a, b| (from - a.0).abs().total_cmp(&(from - b.0).abs()));
            0
        }
        Fuse::Median => {
            columns.sort_by(|a, b| a.0.total_cmp(&b.0));
            columns.len() / 2
        }
    };

    for (i, (x, members)) in columns.iter_mut().enumerate() {
        let junction = format!("{prefix}junction_{i}");
        net.add_node(junction.clone(), (*x, anchor.1), None);
        members.push((anchor.1, junction.clone()));
        if i == fuse_index {
            net.add_node(anchor_label, anchor, None);
            net.add_edge(anchor_label, &junction, Layer::Mx);
        }
        if i > 0 {
            net.add_edge(&junction, &format!("{prefix}junction_{}", i - 1), Layer::Mx);
        }
        members.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        for pair in members.windows(2) {
            net.add_edge(&pair[1].1, &pair[0].1, Layer::Mx);
        }
    }
    net
}

/// Puts a sparse, evenly spaced share of the loads in the partial state.
///
/// The share equals the chance that a random load column sits on this
/// wire. `loads` must be in fanout order; every other load is turned off.
pub fn assign_states(net: &mut MeasurementNet, loads: &[Load], max_height: u32) -> SynthResult<()> {
    if loads.is_empty() {
        return Ok(());
    }
    let mut total_cols = 0u32;
    for load in loads {
        total_cols += mux_dimensions(load.size, max_height)?.1;
    }
    let fanout = loads.len();
    let partial = ((fanout * fanout) as f64 / f64::from(total_cols)).ceil() as usize;
    let space = (fanout / partial.max(1)).max(1);
    for (i, load) in loads.iter().enumerate() {
        let state = if i % space == 0 {
            MuxState::Partial
        } else {
            MuxState::Off
        };
        net.set_state(&load.label, state);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(label: &str, x: f64, y: f64) -> Load {
        Load {
            label: label.to_string(),
            pin: (x, y),
            size: 16,
        }
    }

    fn connected(net: &MeasurementNet, a: &str, b: &str) -> bool {
        net.edges()
            .iter()
            .any(|e| (e.a == a && e.b == b) || (e.a == b && e.b == a))
    }

    #[test]
    fn nearby_loads_share_a_column() {
        let loads = [load("t0", -10.0, 4.0), load("t1", -15.0, 20.0), load("t2", -60.0, 8.0)];
        let net = lattice(&loads, "wire_t", (-30.0, 12.0), "", Fuse::Median);
        // two columns: x = -60 and x = -10
        assert!(net.contains("junction_0"));
        assert!(net.contains("junction_1"));
        assert!(!net.contains("junction_2"));
        assert_eq!(net.node("junction_0").unwrap().coords, (-60.0, 12.0));
        // t0 (y 4) -> junction (y 12) -> t1 (y 20)
        assert!(connected(&net, "t0", "junction_1"));
        assert!(connected(&net, "junction_1", "t1"));
        // median of two columns is index 1
        assert!(connected(&net, "wire_t", "junction_1"));
        assert!(connected(&net, "junction_0", "junction_1"));
        assert!(net.edges().iter().all(|e| e.layer == Layer::Mx));
    }

    #[test]
    fn nearest_fuse_orders_by_distance() {
        let loads = [load("t0", -100.0, 4.0), load("t1", -20.0, 4.0)];
        let net = lattice(&loads, "wire_s", (80.0, 24.0), "", Fuse::Nearest(80.0));
        assert_eq!(net.node("junction_0").unwrap().coords.0, -20.0);
        assert!(connected(&net, "wire_s", "junction_0"));
    }

    #[test]
    fn prefixed_junctions() {
        let net = lattice(&[load("t_1_0", 0.0, 0.0)], "tap_1_t", (0.0, 3.0), "tp_1_", Fuse::Median);
        assert!(net.contains("tp_1_junction_0"));
        assert!(connected(&net, "tap_1_t", "tp_1_junction_0"));
    }

    #[test]
    fn states_are_evenly_spaced() {
        // 4 loads of 16 inputs: 4 columns each, 16 total; ceil(16/16) = 1 partial
        let loads: Vec<Load> = (0..4).map(|i| load(&format!("t{i}"), f64::from(i) * -50.0, 0.0)).collect();
        let mut net = lattice(&loads, "wire_t", (0.0, 0.0), "", Fuse::Median);
        assign_states(&mut net, &loads, 48).unwrap();
        let states: Vec<MuxState> = loads
            .iter()
            .map(|l| net.node(&l.label).unwrap().mux.unwrap().state)
            .collect();
        assert_eq!(
            states,
            vec![MuxState::Partial, MuxState::Off, MuxState::Off, MuxState::Off]
        );
    }

    #[test]
    fn retargeting_keeps_edges() {
        let loads = [load("t0", 0.0, 0.0), load("t1", 0.0, 10.0)];
        let mut net = lattice(&loads, "wire_t", (0.0, 5.0), "", Fuse::Median);
        net.relabel("t0", TARGET);
        let swapped = net.retargeted("t1", 0);
        assert!(swapped.contains("prev_t_0"));
        assert!(swapped.contains(TARGET));
        assert!(!swapped.contains("t1"));
        assert!(connected(&swapped, "junction_0", TARGET));
        assert_eq!(swapped.node(TARGET).unwrap().coords, (0.0, 10.0));
    }

    #[test]
    fn add_edge_is_undirected() {
        let mut net = MeasurementNet::new();
        net.add_edge("a", "b", Layer::Mx);
        net.add_edge("b", "a", Layer::My);
        assert_eq!(net.edges().len(), 1);
        assert_eq!(net.edges()[0].layer, Layer::My);
    }
}
