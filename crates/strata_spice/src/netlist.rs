//! Extraction of measurement nets from a balanced architecture.
//!
//! Pin coordinates come from the mux stack of the representative slot.
//! Loads in the two adjacent slots reuse those pins shifted by one BLE
//! height; loads further away are not modelled.

use crate::net::{assign_states, lattice, Fuse, Layer, Load, MeasurementNet, MuxLoad, MuxState, SOURCE, TARGET};
use strata_common::{Axis, SynthResult, SynthesisError};
use strata_config::{Cluster, TechNode};
use strata_layout::{BalancedArchitecture, MuxId};
use strata_rrg::{Edge, NodeKind, NodeName, WireNode};

/// Horizontal position of the LUT output driver, in fin pitches.
const LUT_OUTPUT_X: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pin {
    input: (f64, f64),
    output: (f64, f64),
    size: u32,
}

/// The connection-block mux switched on in a wire net.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionLoad {
    /// Cluster input the mux drives.
    pub name: NodeName,
    /// Midpoint between the mux input and output, in fin pitches.
    pub center_x: f64,
    /// Input count.
    pub size: u32,
}

/// A wire net ready for simulation.
#[derive(Debug, Clone)]
pub struct WireNet {
    /// The RC network.
    pub net: MeasurementNet,
    /// Driven wire.
    pub source: WireNode,
    /// Conducting connection-block mux, if the wire feeds any.
    pub connection: Option<ConnectionLoad>,
    /// Horizontal displacement applied to the loads of a horizontal wire.
    pub load_shift: f64,
}

impl WireNet {
    /// Target x position before the load shift, in fin pitches.
    pub fn target_x(&self) -> Option<f64> {
        self.net.node(TARGET).map(|n| n.coords.0 - self.load_shift)
    }
}

/// Builds measurement nets for one balanced architecture.
pub struct NetBuilder<'a> {
    arch: &'a BalancedArchitecture,
    cluster: &'a Cluster,
    tech: &'a TechNode,
    separate_taps: bool,
}

impl<'a> NetBuilder<'a> {
    /// Creates a builder.
    pub fn new(arch: &'a BalancedArchitecture, cluster: &'a Cluster, tech: &'a TechNode, separate_taps: bool) -> Self {
        Self {
            arch,
            cluster,
            tech,
            separate_taps,
        }
    }

    /// Tile pitch in (fin, gate) pitches: the larger of active and metal footprints.
    pub fn tile_span(&self) -> (f64, f64) {
        (
            self.arch.tile.width.max(self.arch.metal.width) / self.tech.fin_pitch,
            self.arch.tile.height.max(self.arch.metal.height) / self.tech.gate_pitch,
        )
    }

    fn pin(&self, name: &NodeName) -> Option<Pin> {
        let rep = self.cluster.representative_slot();
        let slot = name.slot()?;
        let height = f64::from(self.cluster.lut_height);
        let shift = if slot == rep {
            0.0
        } else if slot == rep + 1 {
            height
        } else if rep > 0 && slot == rep - 1 {
            -height
        } else {
            return None;
        };
        let placement = self.arch.layout.for_node(&name.in_slot(rep))?;
        Some(Pin {
            input: (placement.input_pin.0, placement.input_pin.1 + shift),
            output: (placement.output_pin.0, placement.output_pin.1 + shift),
            size: placement.inputs,
        })
    }

    fn source_pin(&self, name: &NodeName) -> SynthResult<Pin> {
        self.pin(name).ok_or_else(|| {
            SynthesisError::measurement(format!("no placed multiplexer drives '{name}'"))
        })
    }

    /// Distinct placed successors reached through edges accepted by `keep`.
    fn fanout(&self, name: &NodeName, keep: impl Fn(&Edge) -> bool) -> Vec<(NodeName, Pin)> {
        let graph = &self.arch.graph;
        let Some(id) = graph.id(name) else {
            return Vec::new();
        };
        let mut out: Vec<(NodeName, Pin)> = Vec::new();
        for edge in graph.outgoing(id).filter(|e| keep(e)) {
            let child = graph.node(edge.dst).name;
            if out.iter().any(|(n, _)| *n == child) {
                continue;
            }
            if let Some(pin) = self.pin(&child) {
                out.push((child, pin));
            }
        }
        out
    }

    fn distance(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        (a.0 - b.0).abs() * self.tech.fin_pitch + (a.1 - b.1).abs() * self.tech.gate_pitch
    }

    /// Builds the net of one wire instance of the representative slot.
    pub fn wire_net(&self, source: &WireNode) -> SynthResult<WireNet> {
        match source.axis() {
            Axis::Horizontal => self.horizontal_net(source),
            Axis::Vertical => self.vertical_net(source),
        }
    }

    fn horizontal_net(&self, source: &WireNode) -> SynthResult<WireNet> {
        let name = NodeName::Wire(*source);
        let src = self.source_pin(&name)?;
        let wire_s = (src.output.0, 0.5 * f64::from(self.cluster.lut_height));

        let mut fanout = self.fanout(&name, |_| true);
        fanout.sort_by(|a, b| {
            self.distance(a.1.input, wire_s)
                .total_cmp(&self.distance(b.1.input, wire_s))
        });
        let loads = label_loads(&fanout, |i| format!("t{i}"), Some(median_switch_load(&fanout, &name)?));
        let shift = f64::from(source.length) * self.tile_span().0;

        let mut net = MeasurementNet::new();
        let lat = lattice(&loads, "wire_t", mean_pin(&loads), "", Fuse::Median);
        net.merge(&lat, (shift, 0.0));
        net.add_node(SOURCE, src.output, Some(driver_load(src.size)));
        net.add_node("wire_s", wire_s, None);
        net.add_edge(SOURCE, "wire_s", Layer::My);
        net.add_edge("wire_s", "wire_t", Layer::My);

        assign_states(&mut net, &loads, self.cluster.lut_height)?;
        net.set_state(TARGET, MuxState::On);
        let connection = switch_on_connection(&mut net, &fanout, &loads);
        Ok(WireNet {
            net,
            source: *source,
            connection,
            load_shift: shift,
        })
    }

    fn vertical_net(&self, source: &WireNode) -> SynthResult<WireNet> {
        let source = source.at_tap(0);
        let name = NodeName::Wire(source);
        let src = self.source_pin(&name)?;
        let tap_count = self.cluster.tap_count;
        let spacing = f64::from(self.cluster.tap_spacing);
        let tile_height = self.tile_span().1;

        let mut net = MeasurementNet::new();
        let mut y = src.output.1;
        net.add_node("wire_s", (-1.0, y), None);
        net.add_edge("wire_s", "tap_0_s", Layer::My);

        let mut min_x = f64::INFINITY;
        let mut connection = None;
        for tap in 0..tap_count {
            let last = tap + 1 == tap_count;
            let step = if tap > 0 {
                spacing
            } else {
                f64::from(source.length) - (f64::from(tap_count) * spacing - 1.0)
            };
            y += step * tile_height;
            let tap_s = format!("tap_{tap}_s");
            let tap_t = format!("tap_{tap}_t");
            net.add_node(tap_s.clone(), (0.0, y), None);
            net.add_node(tap_t.clone(), (0.0, y), None);
            net.add_edge(&tap_s, &tap_t, if last { Layer::My } else { Layer::Mx });

            let fanout = if self.separate_taps {
                let mut f = self.fanout(&NodeName::Wire(source.at_tap(tap)), |_| true);
                f.sort_by(|a, b| {
                    a.1.input
                        .1
                        .total_cmp(&b.1.input.1)
                        .then(a.1.input.0.total_cmp(&b.1.input.0))
                });
                f
            } else {
                let mut f = self.fanout(&name, |e| e.tap.unwrap_or(tap_count - 1) == tap);
                let key = |p: &Pin| p.input.0 * self.tech.fin_pitch - p.input.1.abs() * self.tech.gate_pitch;
                f.sort_by(|a, b| key(&a.1).total_cmp(&key(&b.1)));
                f
            };
            let target = if last {
                Some(median_switch_load(&fanout, &name)?)
            } else {
                None
            };
            let loads = label_loads(&fanout, |i| format!("t_{tap}_{i}"), target);

            if !loads.is_empty() {
                let avg = mean_pin(&loads);
                let lat = lattice(&loads, &tap_t, (0.0, avg.1), &format!("tp_{tap}_"), Fuse::Median);
                net.merge(&lat, (0.0, y));
                if let Some(node) = net.node_mut(&tap_t) {
                    node.coords.0 = avg.0;
                }
                for load in &loads {
                    min_x = min_x.min(load.pin.0);
                }
                assign_states(&mut net, &loads, self.cluster.lut_height)?;
                if last {
                    connection = switch_on_connection(&mut net, &fanout, &loads);
                }
            }
            if !last {
                net.add_edge(&tap_s, &format!("tap_{}_s", tap + 1), Layer::My);
            }
        }

        net.add_node(SOURCE, src.output, Some(driver_load(src.size)));
        net.add_edge(SOURCE, "wire_s", Layer::My);
        net.set_state(TARGET, MuxState::On);

        let spine_x = 0.5 * (min_x + f64::from(self.cluster.lut_width));
        let taps: Vec<String> = net
            .nodes()
            .iter()
            .filter(|n| n.label.starts_with("tap_") && n.label.ends_with("_s"))
            .map(|n| n.label.clone())
            .collect();
        for label in taps {
            if let Some(node) = net.node_mut(&label) {
                node.coords.0 += spine_x;
            }
        }
        if let Some(node) = net.node_mut("wire_s") {
            node.coords.0 = spine_x;
        }
        Ok(WireNet {
            net,
            source,
            connection,
            load_shift: 0.0,
        })
    }

    /// Builds the net from a LUT output to the wires it drives.
    pub fn lut_access_net(&self) -> SynthResult<MeasurementNet> {
        let output = NodeName::ClusterOutput {
            slot: self.cluster.representative_slot(),
            output: 0,
        };
        let lut_y = f64::from(self.cluster.lut_height) / (f64::from(self.cluster.lut_scale()) / 2.0);
        let origin = (LUT_OUTPUT_X, lut_y);

        let mut fanout = self.fanout(&output, |_| true);
        if fanout.is_empty() {
            return Err(SynthesisError::measurement(format!(
                "'{output}' drives no placed multiplexer"
            )));
        }
        fanout.sort_by(|a, b| {
            a.1.input
                .1
                .total_cmp(&b.1.input.1)
                .then(a.1.input.0.total_cmp(&b.1.input.0))
        });
        fanout.sort_by(|a, b| {
            self.distance(a.1.input, origin)
                .total_cmp(&self.distance(b.1.input, origin))
        });
        let loads = label_loads(&fanout, |i| format!("t{i}"), Some(fanout.len() / 2));

        let mut net = lattice(&loads, "wire_s", origin, "", Fuse::Nearest(LUT_OUTPUT_X));
        assign_states(&mut net, &loads, self.cluster.lut_height)?;
        net.set_state(TARGET, MuxState::On);
        Ok(net)
    }

    /// Wire instances of one type in the representative slot, in stacking order.
    pub fn candidate_sources(&self, axis: Axis, length: u32) -> Vec<WireNode> {
        self.arch
            .layout
            .placements()
            .iter()
            .filter_map(|p| match p.id {
                MuxId::Node(NodeName::Wire(w))
                    if w.axis() == axis && w.length == length && w.tap == 0 =>
                {
                    Some(w)
                }
                _ => None,
            })
            .collect()
    }

    /// Candidate sources ordered by connectivity weighted by their distance
    /// from the stack origin along the wire's cross axis.
    pub fn ranked_sources(&self, axis: Axis, length: u32) -> Vec<WireNode> {
        let graph = &self.arch.graph;
        let mut ranked: Vec<(f64, WireNode)> = self
            .candidate_sources(axis, length)
            .into_iter()
            .map(|w| {
                let degree: usize = (0..self.cluster.tap_count.max(1))
                    .filter_map(|tap| graph.id(&NodeName::Wire(w.at_tap(tap))))
                    .map(|id| graph.in_degree(id) + graph.out_degree(id))
                    .sum();
                let offset = self
                    .arch
                    .layout
                    .for_node(&NodeName::Wire(w))
                    .map_or(0.0, |p| match axis {
                        Axis::Horizontal => p.output_pin.1,
                        Axis::Vertical => p.output_pin.0,
                    });
                (degree as f64 * offset.abs(), w)
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        ranked.into_iter().map(|(_, w)| w).collect()
    }
}

fn driver_load(size: u32) -> MuxLoad {
    MuxLoad {
        size,
        state: MuxState::On,
        potential_target: false,
    }
}

/// Index of the median switch-block load; the measured target.
fn median_switch_load(fanout: &[(NodeName, Pin)], source: &NodeName) -> SynthResult<usize> {
    let sb: Vec<usize> = fanout
        .iter()
        .enumerate()
        .filter(|(_, (n, _))| n.kind() != NodeKind::CbOut)
        .map(|(i, _)| i)
        .collect();
    sb.get(sb.len() / 2).copied().ok_or_else(|| {
        SynthesisError::measurement(format!("'{source}' drives no switch-block multiplexer"))
    })
}

fn label_loads(fanout: &[(NodeName, Pin)], label: impl Fn(usize) -> String, target: Option<usize>) -> Vec<Load> {
    fanout
        .iter()
        .enumerate()
        .map(|(i, (_, pin))| Load {
            label: if Some(i) == target {
                TARGET.to_string()
            } else {
                label(i)
            },
            pin: pin.input,
            size: pin.size,
        })
        .collect()
}

fn mean_pin(loads: &[Load]) -> (f64, f64) {
    let n = loads.len().max(1) as f64;
    let (x, y) = loads
        .iter()
        .fold((0.0, 0.0), |acc, l| (acc.0 + l.pin.0, acc.1 + l.pin.1));
    (x / n, y / n)
}

/// Turns on the median connection-block load.
fn switch_on_connection(net: &mut MeasurementNet, fanout: &[(NodeName, Pin)], loads: &[Load]) -> Option<ConnectionLoad> {
    let cb: Vec<usize> = fanout
        .iter()
        .enumerate()
        .filter(|(_, (n, _))| n.kind() == NodeKind::CbOut)
        .map(|(i, _)| i)
        .collect();
    let &i = cb.get(cb.len() / 2)?;
    net.set_state(&loads[i].label, MuxState::On);
    let (name, pin) = fanout[i];
    Some(ConnectionLoad {
        name,
        center_x: 0.5 * (pin.input.0 + pin.output.0),
        size: pin.size,
    })
}
