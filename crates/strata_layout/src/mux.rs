//! Multiplexer inventory and per-mux physical arrangement.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strata_common::{SynthResult, SynthesisError};
use strata_config::Cluster;
use strata_rrg::{NodeKind, NodeName, RoutingGraph};

/// Identifies one multiplexer of the representative slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MuxId {
    /// Crossbar mux selecting LUT input `i`.
    Crossbar(u32),
    /// Connection-block or switch-block mux driving a routing node.
    Node(NodeName),
}

impl MuxId {
    /// Name with the slot prefix removed, as listed in the padding log.
    pub fn label(&self) -> String {
        match self {
            Self::Crossbar(i) => format!("crossbar{i}"),
            Self::Node(name) => {
                let full = name.to_string();
                match name.slot() {
                    Some(slot) => full
                        .strip_prefix(&format!("ble_{slot}_"))
                        .map(str::to_string)
                        .unwrap_or(full),
                    None => full,
                }
            }
        }
    }
}

impl fmt::Display for MuxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crossbar(i) => write!(f, "crossbar{i}"),
            Self::Node(name) => write!(f, "{name}"),
        }
    }
}

/// Input counts of the routing muxes of the representative slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MuxSizes {
    /// Connection-block muxes keyed by the cluster input they drive.
    pub connection_block: BTreeMap<NodeName, u32>,
    /// Switch-block muxes keyed by the wire they drive.
    pub switch_block: BTreeMap<NodeName, u32>,
}

impl MuxSizes {
    /// Largest routing-mux fan-in, crossbar excluded.
    pub fn largest(&self) -> u32 {
        self.connection_block
            .values()
            .chain(self.switch_block.values())
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Input count of the mux driving `name`.
    pub fn get(&self, name: &NodeName) -> Option<u32> {
        self.connection_block
            .get(name)
            .or_else(|| self.switch_block.get(name))
            .copied()
    }

    /// All routing muxes grouped by input count, labels sorted.
    pub fn by_size(&self) -> BTreeMap<u32, Vec<String>> {
        let mut grouped: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for (name, size) in self.connection_block.iter().chain(&self.switch_block) {
            grouped
                .entry(*size)
                .or_default()
                .push(MuxId::Node(*name).label());
        }
        for labels in grouped.values_mut() {
            labels.sort();
        }
        grouped
    }
}

/// Reads the routing-mux sizes of the representative slot off the graph.
///
/// Only slot-local nodes with at least one driver count. Inputs arriving
/// from I/O pins are ignored; parallel edges each occupy a mux input.
pub fn mux_sizes(graph: &RoutingGraph, cluster: &Cluster) -> MuxSizes {
    let slot = cluster.representative_slot();
    let mut sizes = MuxSizes::default();
    for (id, node) in graph.nodes() {
        if node.name.slot() != Some(slot) || graph.in_degree(id) == 0 {
            continue;
        }
        let inputs = graph
            .incoming(id)
            .filter(|e| !graph.node(e.src).name.is_io())
            .count() as u32;
        match node.kind {
            NodeKind::CbOut => {
                sizes.connection_block.insert(node.name, inputs);
            }
            NodeKind::HTrack | NodeKind::VTrack => {
                if node.name.as_wire().is_some_and(|w| w.tap == 0) {
                    sizes.switch_block.insert(node.name, inputs);
                }
            }
            _ => {}
        }
    }
    sizes
}

/// Row and column count of a mux with `inputs` inputs.
///
/// Columns grow with the square root of the input count but never past
/// half the available height.
pub fn mux_dimensions(inputs: u32, max_height: u32) -> SynthResult<(u32, u32)> {
    if inputs == 0 {
        return Err(SynthesisError::layout("multiplexer has no inputs"));
    }
    let cols = (max_height / 2).min(f64::from(inputs).sqrt().ceil() as u32);
    if cols == 0 {
        return Err(SynthesisError::layout(format!(
            "cluster height of {max_height} gate pitches cannot hold a multiplexer"
        )));
    }
    Ok((inputs.div_ceil(cols), cols))
}
