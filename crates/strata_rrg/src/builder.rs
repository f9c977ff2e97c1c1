//! Routing graph construction from a channel composition.

use crate::graph::RoutingGraph;
use crate::node::{NodeName, WireNode};
use crate::pattern::{disjoint_cb, disjoint_sb, disjoint_twist, is_loopback, sb_offset};
use std::collections::BTreeMap;
use strata_channel::Composition;
use strata_common::{Axis, Side, SwitchKind, SynthResult, SynthesisError};
use strata_config::{Cluster, PatternConfig};
use tracing::debug;

/// Builds the logical routing graph of one cluster tile.
///
/// The same logical graph recurs at every tile, so it is built once per
/// composition. Construction is deterministic: the same inputs always
/// produce the same node and edge order.
pub struct GraphBuilder<'a> {
    cluster: &'a Cluster,
    pattern: &'a PatternConfig,
    composition: &'a Composition,
}

impl<'a> GraphBuilder<'a> {
    /// Creates a builder.
    pub fn new(cluster: &'a Cluster, pattern: &'a PatternConfig, composition: &'a Composition) -> Self {
        Self {
            cluster,
            pattern,
            composition,
        }
    }

    /// Builds the full graph.
    pub fn build(&self) -> SynthResult<RoutingGraph> {
        let mut graph = RoutingGraph::new();
        self.add_io_pins(&mut graph)?;
        self.add_cluster_pins(&mut graph)?;
        self.add_channels(&mut graph)?;
        self.add_connection_blocks(&mut graph)?;
        self.add_output_drivers(&mut graph)?;
        self.add_switch_blocks(&mut graph)?;
        if self.pattern.twists {
            self.add_twists(&mut graph)?;
        }
        self.add_cluster_sinks_and_sources(&mut graph)?;
        self.add_io_sinks_and_sources(&mut graph)?;
        self.check_wire_targets(&graph)?;
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built routing graph"
        );
        Ok(graph)
    }

    /// Number of tap nodes materialized per vertical wire.
    fn taps_per_wire(&self, length: u32) -> u32 {
        if self.pattern.separate_taps {
            length.min(self.cluster.tap_count)
        } else {
            1
        }
    }

    fn type_count(&self, wire: &WireNode) -> u32 {
        self.composition.channel(wire.axis()).count(wire.length)
    }

    fn is_twist_wire(&self, wire: &WireNode) -> bool {
        match wire.axis() {
            Axis::Horizontal => wire.length == 1,
            Axis::Vertical => wire.length == self.cluster.min_vertical_length,
        }
    }

    /// Only the first and last taps take part in switch blocks.
    fn joins_switch_block(&self, wire: &WireNode) -> bool {
        wire.tap == 0 || wire.tap + 1 == self.cluster.tap_count
    }

    /// Can this node be the target of a switch-block mux?
    fn is_sb_target(&self, wire: &WireNode) -> bool {
        wire.axis() == Axis::Horizontal || wire.tap == 0 || self.cluster.tap_count <= 1
    }

    /// Distance a source wire covers before reaching a switch block, or
    /// `None` if this tap node never drives one.
    fn sb_source_length(&self, wire: &WireNode) -> Option<u32> {
        if wire.axis() == Axis::Vertical && self.pattern.separate_taps && self.cluster.tap_count > 1 {
            if wire.tap == 0 {
                return None;
            }
            return Some(self.cluster.tap_spacing);
        }
        Some(wire.length)
    }

    fn add_io_pins(&self, graph: &mut RoutingGraph) -> SynthResult<()> {
        for i in 0..self.cluster.io_capacity {
            graph.add_node(NodeName::PadInput(i), 3 * i)?;
            graph.add_node(NodeName::PadOutput(i), 3 * i + 1)?;
            graph.add_node(NodeName::PadClock(i), 3 * i + 2)?;
        }
        Ok(())
    }

    fn add_cluster_pins(&self, graph: &mut RoutingGraph) -> SynthResult<()> {
        let group = self.cluster.inputs_per_slot();
        for i in 0..self.cluster.inputs {
            let name = NodeName::ClusterInput {
                slot: i / group,
                pin: i % group,
            };
            graph.add_node(name, i)?;
        }
        let mut ptc = self.cluster.inputs;
        for slot in 0..self.cluster.n {
            for output in 0..self.cluster.outputs {
                graph.add_node(NodeName::ClusterOutput { slot, output }, ptc)?;
                ptc += 1;
            }
        }
        graph.add_node(NodeName::ClusterClock, ptc)?;
        Ok(())
    }

    fn add_channels(&self, graph: &mut RoutingGraph) -> SynthResult<()> {
        let mut h_ptc = 0;
        let mut v_ptc = 0;
        for slot in 0..self.cluster.n {
            for (length, count) in self.composition.horizontal.populated() {
                for index in 0..count {
                    for side in Axis::Horizontal.sides() {
                        let wire = WireNode {
                            slot,
                            side,
                            length,
                            index,
                            tap: 0,
                        };
                        graph.add_node(NodeName::Wire(wire), h_ptc)?;
                        h_ptc += 1;
                    }
                }
            }
            for (length, count) in self.composition.vertical.populated() {
                for index in 0..count {
                    for tap in 0..self.taps_per_wire(length) {
                        for side in [Side::Up, Side::Down] {
                            let wire = WireNode {
                                slot,
                                side,
                                length,
                                index,
                                tap,
                            };
                            graph.add_node(NodeName::Wire(wire), v_ptc)?;
                            v_ptc += 1;
                            if tap > 0 {
                                self.chain_tap(graph, wire)?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Links a tap node to the previous tap of the same wire.
    fn chain_tap(&self, graph: &mut RoutingGraph, wire: WireNode) -> SynthResult<()> {
        let distance = if wire.tap > 1 {
            self.cluster.tap_spacing as i32
        } else {
            wire.length as i32 - (self.cluster.tap_count as i32 - 1)
        };
        let dy = if wire.side.is_increasing() { distance } else { -distance };
        graph.connect(
            &NodeName::Wire(wire.at_tap(wire.tap - 1)),
            &NodeName::Wire(wire),
            SwitchKind::Wire(wire.class()),
            (0, dy),
            None,
        )?;
        Ok(())
    }

    fn cb_pins(&self, wire: &WireNode) -> Vec<u32> {
        let group = self.cluster.inputs_per_slot();
        let count = self.type_count(wire);
        (0..group)
            .filter(|&pin| !self.pattern.disjoint_cb || disjoint_cb(wire.index, count, group, pin))
            .collect()
    }

    fn add_connection_blocks(&self, graph: &mut RoutingGraph) -> SynthResult<()> {
        for (_, wire) in graph.wires() {
            let pins = self.cb_pins(&wire);
            let length = wire.length as i32;
            let mut targets: Vec<((i32, i32), Option<u32>)> = Vec::new();
            match wire.side {
                Side::Left => targets.push(((-length, 0), None)),
                Side::Right => targets.push(((length, 0), None)),
                Side::Up | Side::Down => {
                    let sweep: Vec<u32> = if self.pattern.separate_taps {
                        vec![wire.tap]
                    } else {
                        (0..self.cluster.tap_count).collect()
                    };
                    for tap in sweep {
                        let dy = if self.pattern.separate_taps {
                            if tap > 0 {
                                self.cluster.tap_spacing as i32
                            } else {
                                length - (self.cluster.tap_count * self.cluster.tap_spacing) as i32 + 1
                            }
                        } else {
                            self.cluster.tap_offset(wire.length, tap)
                        };
                        let dy = if wire.side == Side::Down { -dy } else { dy };
                        targets.push(((0, dy), Some(tap)));
                    }
                }
            }
            for (offset, tap) in targets {
                for &pin in &pins {
                    graph.connect(
                        &NodeName::Wire(wire),
                        &NodeName::ClusterInput {
                            slot: wire.slot,
                            pin,
                        },
                        SwitchKind::ConnectionBlock,
                        offset,
                        tap,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Every BLE output drives every wire starting at its own slot.
    fn add_output_drivers(&self, graph: &mut RoutingGraph) -> SynthResult<()> {
        for (_, wire) in graph.wires() {
            if !self.is_sb_target(&wire) {
                continue;
            }
            let switch = SwitchKind::Wire(wire.at_tap(0).class());
            for output in 0..self.cluster.outputs {
                graph.connect(
                    &NodeName::ClusterOutput {
                        slot: wire.slot,
                        output,
                    },
                    &NodeName::Wire(wire),
                    switch,
                    (0, 0),
                    None,
                )?;
            }
        }
        Ok(())
    }

    /// Wires taking part in switch blocks, grouped by slot and side.
    fn wires_by_slot(&self, graph: &RoutingGraph) -> BTreeMap<u32, BTreeMap<Side, Vec<WireNode>>> {
        let mut by_slot: BTreeMap<u32, BTreeMap<Side, Vec<WireNode>>> = BTreeMap::new();
        for (_, wire) in graph.wires() {
            if wire.axis() == Axis::Vertical && !self.joins_switch_block(&wire) {
                continue;
            }
            by_slot
                .entry(wire.slot)
                .or_default()
                .entry(wire.side)
                .or_default()
                .push(wire);
        }
        by_slot
    }

    fn add_switch_blocks(&self, graph: &mut RoutingGraph) -> SynthResult<()> {
        let by_slot = self.wires_by_slot(graph);
        for sides in by_slot.values() {
            for (&target_side, targets) in sides {
                for (&source_side, sources) in sides {
                    if is_loopback(target_side, source_side) {
                        continue;
                    }
                    for target in targets.iter().filter(|w| self.is_sb_target(w)) {
                        let switch = SwitchKind::Wire(target.at_tap(0).class());
                        let target_count = self.type_count(target);
                        for source in sources {
                            let Some(length) = self.sb_source_length(source) else {
                                continue;
                            };
                            let Some(offset) = sb_offset(source_side, target_side, length) else {
                                continue;
                            };
                            if self.pattern.disjoint_sb
                                && !disjoint_sb(
                                    source.index,
                                    self.type_count(source),
                                    target.index,
                                    target_count,
                                )
                            {
                                continue;
                            }
                            graph.connect(
                                &NodeName::Wire(*source),
                                &NodeName::Wire(*target),
                                switch,
                                offset,
                                None,
                            )?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Connects minimal wires of vertically adjacent slots.
    ///
    /// Slot `n` is fed from slots `n + 1` and `n - 1`; the neighbours of the
    /// first and last slot wrap into the adjacent cluster.
    fn add_twists(&self, graph: &mut RoutingGraph) -> SynthResult<()> {
        let by_slot = self.wires_by_slot(graph);
        let n = self.cluster.n;
        for (&slot, target_sides) in &by_slot {
            let up = if slot + 1 == n { (0, 1) } else { (slot + 1, 0) };
            let down = if slot == 0 { (n - 1, -1) } else { (slot - 1, 0) };
            for (neighbour, dy) in [up, down] {
                if dy != 0 && self.pattern.cut_cross_cluster_twists {
                    continue;
                }
                let Some(source_sides) = by_slot.get(&neighbour) else {
                    continue;
                };
                for (&target_side, targets) in target_sides {
                    for (&source_side, sources) in source_sides {
                        if is_loopback(target_side, source_side) {
                            continue;
                        }
                        if source_side != target_side && self.pattern.continuation_twists_only {
                            continue;
                        }
                        self.connect_twists(graph, targets, sources, source_side, target_side, dy)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn connect_twists(
        &self,
        graph: &mut RoutingGraph,
        targets: &[WireNode],
        sources: &[WireNode],
        source_side: Side,
        target_side: Side,
        dy: i32,
    ) -> SynthResult<()> {
        for target in targets
            .iter()
            .filter(|w| self.is_twist_wire(w) && self.is_sb_target(w))
        {
            let switch = SwitchKind::Wire(target.at_tap(0).class());
            let target_count = self.type_count(target);
            for source in sources.iter().filter(|w| self.is_twist_wire(w)) {
                let Some(length) = self.sb_source_length(source) else {
                    continue;
                };
                let Some((ox, oy)) = sb_offset(source_side, target_side, length) else {
                    continue;
                };
                if self.pattern.disjoint_sb
                    && !disjoint_twist(source.index, target.index, target_count)
                {
                    continue;
                }
                graph.connect(
                    &NodeName::Wire(*source),
                    &NodeName::Wire(*target),
                    switch,
                    (ox, oy + dy),
                    None,
                )?;
            }
        }
        Ok(())
    }

    fn add_cluster_sinks_and_sources(&self, graph: &mut RoutingGraph) -> SynthResult<()> {
        let sink = graph.add_node(NodeName::ClusterInputSink, 0)?;
        let source = graph.add_node(NodeName::ClusterOutputSource, 1)?;
        let clk_sink = graph.add_node(NodeName::ClusterClockSink, 2)?;
        let pins: Vec<_> = graph.nodes().map(|(id, n)| (id, n.name)).collect();
        for (id, name) in pins {
            match name {
                NodeName::ClusterInput { .. } => {
                    graph.add_edge(id, sink, SwitchKind::Delayless, (0, 0), None);
                }
                NodeName::ClusterOutput { .. } => {
                    graph.add_edge(source, id, SwitchKind::Delayless, (0, 0), None);
                }
                NodeName::ClusterClock => {
                    graph.add_edge(id, clk_sink, SwitchKind::Delayless, (0, 0), None);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn add_io_sinks_and_sources(&self, graph: &mut RoutingGraph) -> SynthResult<()> {
        for i in 0..self.cluster.io_capacity {
            graph.add_node(NodeName::PadInputSink(i), 0)?;
            graph.add_node(NodeName::PadOutputSource(i), 1)?;
            graph.add_node(NodeName::PadClockSink(i), 2)?;
            let links = [
                (NodeName::PadInput(i), NodeName::PadInputSink(i)),
                (NodeName::PadOutputSource(i), NodeName::PadOutput(i)),
                (NodeName::PadClock(i), NodeName::PadClockSink(i)),
            ];
            for (src, dst) in links {
                graph.connect(&src, &dst, SwitchKind::Delayless, (0, 0), None)?;
            }
        }
        Ok(())
    }

    /// Every wire must drive at least one multiplexer.
    fn check_wire_targets(&self, graph: &RoutingGraph) -> SynthResult<()> {
        for (id, wire) in graph.wires() {
            if graph.out_degree(id) == 0 {
                return Err(SynthesisError::composition(format!(
                    "{} has no legal multiplexer target ({})",
                    wire.class(),
                    NodeName::Wire(wire)
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use std::collections::HashSet;
    use strata_config::SynthesisConfig;

    fn cluster(n: u32) -> Cluster {
        let mut config = SynthesisConfig::default();
        config.architecture.n = n;
        Cluster::from_config(&config)
    }

    fn build(n: u32, pattern: &PatternConfig, wires: &str) -> RoutingGraph {
        let composition = Composition::parse(wires).unwrap();
        let cluster = cluster(n);
        GraphBuilder::new(&cluster, pattern, &composition)
            .build()
            .unwrap()
    }

    fn wire(slot: u32, side: Side, length: u32, index: u32) -> NodeName {
        NodeName::Wire(WireNode {
            slot,
            side,
            length,
            index,
            tap: 0,
        })
    }

    fn has_edge(g: &RoutingGraph, src: NodeName, dst: NodeName) -> Option<(i32, i32)> {
        let s = g.id(&src)?;
        let d = g.id(&dst)?;
        g.outgoing(s).find(|e| e.dst == d).map(|e| e.offset)
    }

    #[test]
    fn horizontal_pairs_per_side() {
        let g = build(2, &PatternConfig::default(), "H 1 2\nH 2 1\n");
        let count = |side| {
            g.wires()
                .iter()
                .filter(|(_, w)| w.side == side)
                .count()
        };
        assert_eq!(count(Side::Left), 2 * (2 + 1));
        assert_eq!(count(Side::Right), 2 * (2 + 1));
        assert_eq!(count(Side::Up), 0);
    }

    #[test]
    fn names_are_unique_and_endpoints_declared() {
        let g = build(4, &PatternConfig::default(), "H 1 3\nH 4 2\nV 2 2\nV 4 1\n");
        let names: HashSet<_> = g.nodes().map(|(_, n)| n.name).collect();
        assert_eq!(names.len(), g.node_count());
        for e in g.edges() {
            assert!(e.src.index() < g.node_count());
            assert!(e.dst.index() < g.node_count());
        }
    }

    #[test]
    fn disjoint_cb_reaches_every_pin() {
        let cluster = cluster(2);
        let g = build(2, &PatternConfig::default(), "H 2 3\n");
        for slot in 0..2 {
            for pin in 0..cluster.inputs_per_slot() {
                let id = g.id(&NodeName::ClusterInput { slot, pin }).unwrap();
                let drivers: HashSet<_> = g
                    .incoming(id)
                    .filter(|e| e.switch == SwitchKind::ConnectionBlock)
                    .map(|e| e.src)
                    .collect();
                // one driver per side
                assert_eq!(drivers.len(), 2, "slot {slot} pin {pin}");
            }
        }
    }

    #[test]
    fn full_cb_drives_every_pin() {
        let cluster = cluster(2);
        let pattern = PatternConfig {
            disjoint_cb: false,
            ..PatternConfig::default()
        };
        let g = build(2, &pattern, "H 2 1\n");
        let id = g.id(&wire(0, Side::Right, 2, 0)).unwrap();
        let pins = g
            .outgoing(id)
            .filter(|e| e.switch == SwitchKind::ConnectionBlock)
            .count();
        assert_eq!(pins as u32, cluster.inputs_per_slot());
    }

    #[test]
    fn horizontal_cb_offset_is_wire_length() {
        let g = build(2, &PatternConfig::default(), "H 4 1\n");
        let pin = NodeName::ClusterInput { slot: 0, pin: 0 };
        assert_eq!(has_edge(&g, wire(0, Side::Left, 4, 0), pin), Some((-4, 0)));
        assert_eq!(has_edge(&g, wire(0, Side::Right, 4, 0), pin), Some((4, 0)));
    }

    #[test]
    fn vertical_cb_edges_sweep_taps() {
        let g = build(2, &PatternConfig::default(), "V 8 1\n");
        let id = g.id(&wire(0, Side::Up, 8, 0)).unwrap();
        let mut taps: Vec<(Option<u32>, i32)> = g
            .outgoing(id)
            .filter(|e| {
                e.switch == SwitchKind::ConnectionBlock
                    && g.node(e.dst).name == NodeName::ClusterInput { slot: 0, pin: 0 }
            })
            .map(|e| (e.tap, e.offset.1))
            .collect();
        taps.sort();
        assert_eq!(
            taps,
            vec![(Some(0), 5), (Some(1), 6), (Some(2), 7), (Some(3), 8)]
        );
        let down = g.id(&wire(0, Side::Down, 8, 0)).unwrap();
        assert!(g
            .outgoing(down)
            .filter(|e| e.switch == SwitchKind::ConnectionBlock)
            .all(|e| e.offset.1 < 0));
    }

    #[test]
    fn no_loopback_switch_block_edges() {
        let g = build(2, &PatternConfig::default(), "H 1 2\nH 2 2\nV 4 2\n");
        for e in g.edges() {
            let (Some(a), Some(b)) = (g.node(e.src).name.as_wire(), g.node(e.dst).name.as_wire())
            else {
                continue;
            };
            assert!(!is_loopback(a.side, b.side), "{a:?} -> {b:?}");
        }
    }

    #[test]
    fn turn_offsets_follow_table() {
        let g = build(2, &PatternConfig::default(), "H 2 1\nV 4 1\n");
        // single instances: the disjoint rule connects index 0 to index 0
        assert_eq!(
            has_edge(&g, wire(1, Side::Right, 2, 0), wire(1, Side::Up, 4, 0)),
            Some((1, 1))
        );
        assert_eq!(
            has_edge(&g, wire(1, Side::Down, 4, 0), wire(1, Side::Left, 2, 0)),
            Some((0, -4))
        );
        assert_eq!(
            has_edge(&g, wire(0, Side::Left, 2, 0), wire(0, Side::Left, 2, 0)),
            Some((-2, 0))
        );
    }

    #[test]
    fn outputs_drive_own_slot_wires() {
        let g = build(2, &PatternConfig::default(), "H 2 2\nV 4 1\n");
        let out = g.id(&NodeName::ClusterOutput { slot: 1, output: 0 }).unwrap();
        let driven: Vec<_> = g
            .outgoing(out)
            .map(|e| g.node(e.dst).name)
            .collect();
        assert_eq!(driven.len(), 2 * 2 + 2);
        assert!(driven.iter().all(|n| n.slot() == Some(1)));
    }

    #[test]
    fn twists_connect_adjacent_slots() {
        let g = build(2, &PatternConfig::default(), "H 1 2\n");
        assert_eq!(
            has_edge(&g, wire(1, Side::Right, 1, 1), wire(0, Side::Right, 1, 0)),
            Some((1, 0))
        );
        // wrap-around twists are cut by default
        for e in g.edges() {
            if g.node(e.src).kind == NodeKind::HTrack && g.node(e.dst).kind == NodeKind::HTrack {
                assert_eq!(e.offset.1, 0);
            }
        }
    }

    #[test]
    fn wrapping_twists_shift_vertically_when_kept() {
        let pattern = PatternConfig {
            cut_cross_cluster_twists: false,
            ..PatternConfig::default()
        };
        let g = build(2, &pattern, "H 1 2\n");
        let src = g.id(&wire(0, Side::Left, 1, 1)).unwrap();
        let dst = g.id(&wire(1, Side::Left, 1, 0)).unwrap();
        let offsets: Vec<_> = g
            .outgoing(src)
            .filter(|e| e.dst == dst)
            .map(|e| e.offset)
            .collect();
        assert!(offsets.contains(&(-1, 1)));
        assert!(offsets.contains(&(-1, 0)));
    }

    #[test]
    fn separate_taps_form_a_chain() {
        let pattern = PatternConfig {
            separate_taps: true,
            ..PatternConfig::default()
        };
        let g = build(2, &pattern, "V 8 1\n");
        let tap = |t| {
            NodeName::Wire(WireNode {
                slot: 0,
                side: Side::Up,
                length: 8,
                index: 0,
                tap: t,
            })
        };
        assert_eq!(has_edge(&g, tap(0), tap(1)), Some((0, 5)));
        assert_eq!(has_edge(&g, tap(1), tap(2)), Some((0, 1)));
        let e = g
            .outgoing(g.id(&tap(2)).unwrap())
            .find(|e| g.node(e.dst).name == tap(3))
            .unwrap();
        assert_eq!(e.switch.name(), "V8_tap_3");
    }

    #[test]
    fn sinks_and_sources_are_delayless() {
        let g = build(2, &PatternConfig::default(), "H 2 1\n");
        let sink = g.id(&NodeName::ClusterInputSink).unwrap();
        assert_eq!(g.in_degree(sink) as u32, cluster(2).inputs);
        assert!(g.incoming(sink).all(|e| e.switch == SwitchKind::Delayless));
        let source = g.id(&NodeName::PadOutputSource(0)).unwrap();
        assert_eq!(g.node(source).kind, NodeKind::Source);
        assert_eq!(g.out_degree(source), 1);
    }

    #[test]
    fn every_wire_has_a_target() {
        let g = build(4, &PatternConfig::default(), "H 2 4\nV 2 3\n");
        for (id, _) in g.wires() {
            assert!(g.out_degree(id) > 0);
        }
    }

    #[test]
    fn build_is_deterministic() {
        let a = build(2, &PatternConfig::default(), "H 1 2\nH 4 1\nV 4 2\n");
        let b = build(2, &PatternConfig::default(), "H 1 2\nH 4 1\nV 4 2\n");
        assert_eq!(a.node_count(), b.node_count());
        let ea: Vec<_> = a.edges().cloned().collect();
        let eb: Vec<_> = b.edges().cloned().collect();
        assert_eq!(ea, eb);
    }
}
