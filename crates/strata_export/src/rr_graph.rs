//! Routing-resource graph export.
//!
//! The logical graph of one tile is instantiated at every grid location:
//! pins and sinks at I/O and cluster tiles, and wire nodes along every
//! channel. Wire nodes are also started in a margin outside the array so
//! that wires entering from beyond the edge exist, trimmed to the array.
//! Edges are resolved through their tile offsets; an edge whose far end was
//! never instantiated is dropped.

use crate::grid::{BlockType, Grid};
use crate::tables::{format_g, segment_span, SegmentTable, SwitchTable};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use strata_common::{Axis, Side, SwitchKind, SynthResult, SynthesisError, WireClass};
use strata_config::Cluster;
use strata_rrg::{NodeKind, NodeName, RoutingGraph, WireNode};
use tracing::{debug, info};

const INDENT: &str = "    ";

type Coords = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeType {
    Source,
    Sink,
    Ipin,
    Opin,
    Chan(Side),
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("SOURCE"),
            Self::Sink => f.write_str("SINK"),
            Self::Ipin => f.write_str("IPIN"),
            Self::Opin => f.write_str("OPIN"),
            Self::Chan(side) => {
                let chan = match side.axis() {
                    Axis::Horizontal => "CHANX",
                    Axis::Vertical => "CHANY",
                };
                let dir = if side.is_increasing() { "INC_DIR" } else { "DEC_DIR" };
                write!(f, "{chan}\" direction=\"{dir}")
            }
        }
    }
}

#[derive(Debug, Clone)]
struct RrNode {
    node_type: NodeType,
    capacity: u32,
    low: Coords,
    high: Coords,
    on_side: bool,
    ptc: u32,
    segment: Option<u32>,
}

impl RrNode {
    fn pin(node_type: NodeType, at: Coords, capacity: u32, ptc: u32, on_side: bool) -> Self {
        Self {
            node_type,
            capacity,
            low: at,
            high: at,
            on_side,
            ptc,
            segment: None,
        }
    }
}

/// Wire nodes of one class with their track numbering.
///
/// A class of `count` tracks spanning `span` tiles owns `count · span`
/// consecutive track numbers starting at `base`; the tile position modulo
/// the span selects which `count`-wide slice a node uses.
struct TrackGroup {
    span: u32,
    base: u32,
    segment: u32,
    tracks: Vec<WireNode>,
}

impl TrackGroup {
    fn ptc(&self, position: i32, rank: usize) -> u32 {
        let slice = position.rem_euclid(self.span as i32) as u32;
        self.base + slice * self.tracks.len() as u32 + rank as u32
    }

    fn width(&self) -> u32 {
        self.span * self.tracks.len() as u32
    }

    fn longest(groups: &[TrackGroup]) -> u32 {
        groups
            .iter()
            .flat_map(|g| g.tracks.iter().map(|w| w.length))
            .max()
            .unwrap_or(0)
    }
}

#[derive(Default)]
struct Instances {
    nodes: Vec<RrNode>,
    ids: HashMap<NodeName, BTreeMap<Coords, u32>>,
    io_fanin: BTreeMap<Coords, Vec<(u32, u32)>>,
    io_fanout: BTreeMap<Coords, Vec<(u32, u32)>>,
    h_width: u32,
    v_width: u32,
}

impl Instances {
    fn push(&mut self, name: NodeName, at: Coords, node: RrNode) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(node);
        self.ids.entry(name).or_default().insert(at, id);
        id
    }

    fn lookup(&self, name: &NodeName, at: Coords) -> Option<u32> {
        self.ids.get(name)?.get(&at).copied()
    }
}

/// A rendered routing-resource graph.
#[derive(Debug, Clone)]
pub struct RrGraphDocument {
    /// The XML text.
    pub xml: String,
    /// Number of exported nodes.
    pub node_count: usize,
    /// Number of exported edges after deduplication.
    pub edge_count: usize,
}

impl RrGraphDocument {
    /// Writes the document to `path`, gzipped with a `.gz` suffix when
    /// `compress` is set. Returns the path written.
    pub fn write(&self, path: &Path, compress: bool) -> SynthResult<PathBuf> {
        if !compress {
            fs::write(path, &self.xml)?;
            return Ok(path.to_path_buf());
        }
        let mut name = path.as_os_str().to_owned();
        name.push(".gz");
        let target = PathBuf::from(name);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(self.xml.as_bytes())?;
        fs::write(&target, encoder.finish()?)?;
        Ok(target)
    }
}

/// Instantiates a logical routing graph over a device grid.
pub struct RrGraphExporter<'a> {
    graph: &'a RoutingGraph,
    cluster: &'a Cluster,
    grid: &'a Grid,
    switches: &'a SwitchTable,
    segments: &'a SegmentTable,
    separate_taps: bool,
}

impl<'a> RrGraphExporter<'a> {
    /// Creates an exporter.
    pub fn new(
        graph: &'a RoutingGraph,
        cluster: &'a Cluster,
        grid: &'a Grid,
        switches: &'a SwitchTable,
        segments: &'a SegmentTable,
        separate_taps: bool,
    ) -> Self {
        Self {
            graph,
            cluster,
            grid,
            switches,
            segments,
            separate_taps,
        }
    }

    /// Renders the full graph. `arch_file` names the companion
    /// architecture description in the header.
    pub fn export(&self, arch_file: &str) -> SynthResult<RrGraphDocument> {
        let inst = self.instantiate()?;
        let edges = self.resolve_edges(&inst)?;
        let mut xml = String::new();
        self.render(&mut xml, arch_file, &inst, &edges)
            .map_err(|e| SynthesisError::export(format!("cannot render rr-graph: {e}")))?;
        info!(
            nodes = inst.nodes.len(),
            edges = edges.len(),
            width = self.grid.width(),
            height = self.grid.height(),
            "exported routing-resource graph"
        );
        Ok(RrGraphDocument {
            xml,
            node_count: inst.nodes.len(),
            edge_count: edges.len(),
        })
    }

    fn instantiate(&self) -> SynthResult<Instances> {
        let mut inst = Instances::default();
        self.add_io_nodes(&mut inst);
        self.add_cluster_nodes(&mut inst)?;
        self.add_tracks(&mut inst)?;
        debug!(nodes = inst.nodes.len(), "instantiated rr nodes");
        Ok(inst)
    }

    fn add_io_nodes(&self, inst: &mut Instances) {
        let capacity = self.cluster.io_capacity;
        for at in self.grid.locations(BlockType::Io) {
            let mut ptc = 0;
            for i in 0..capacity {
                let classes = [
                    (NodeName::PadInputSink(i), NodeType::Sink),
                    (NodeName::PadOutputSource(i), NodeType::Source),
                    (NodeName::PadClockSink(i), NodeType::Sink),
                ];
                for (name, node_type) in classes {
                    inst.push(name, at, RrNode::pin(node_type, at, 1, ptc, false));
                    ptc += 1;
                }
            }
            let mut ptc = 0;
            for i in 0..capacity {
                let pins = [
                    (NodeName::PadInput(i), NodeType::Ipin),
                    (NodeName::PadOutput(i), NodeType::Opin),
                    (NodeName::PadClock(i), NodeType::Ipin),
                ];
                for (name, node_type) in pins {
                    inst.push(name, at, RrNode::pin(node_type, at, 1, ptc, true));
                    ptc += 1;
                }
            }
        }
    }

    fn add_cluster_nodes(&self, inst: &mut Instances) -> SynthResult<()> {
        let pins: BTreeMap<u32, NodeName> = self
            .graph
            .nodes()
            .filter(|(_, n)| matches!(n.kind, NodeKind::CbOut | NodeKind::ClbOut | NodeKind::ClbClk))
            .map(|(_, n)| (n.ptc, n.name))
            .collect();
        let inputs = self.cluster.inputs;
        let outputs = self.cluster.n * self.cluster.outputs;
        for at in self.grid.locations(BlockType::Clb) {
            inst.push(
                NodeName::ClusterInputSink,
                at,
                RrNode::pin(NodeType::Sink, at, inputs, 0, false),
            );
            inst.push(
                NodeName::ClusterOutputSource,
                at,
                RrNode::pin(NodeType::Source, at, outputs, 1, false),
            );
            inst.push(
                NodeName::ClusterClockSink,
                at,
                RrNode::pin(NodeType::Sink, at, 1, 2, false),
            );
            for ptc in 0..inputs + outputs + 1 {
                let name = pins.get(&ptc).ok_or_else(|| {
                    SynthesisError::export(format!("cluster has no pin with index {ptc}"))
                })?;
                let node_type = if ptc < inputs || ptc >= inputs + outputs {
                    NodeType::Ipin
                } else {
                    NodeType::Opin
                };
                inst.push(*name, at, RrNode::pin(node_type, at, 1, ptc, true));
            }
        }
        Ok(())
    }

    fn track_groups(&self, axis: Axis) -> SynthResult<Vec<TrackGroup>> {
        let mut by_class: BTreeMap<WireClass, Vec<WireNode>> = BTreeMap::new();
        for (_, wire) in self.graph.wires() {
            if wire.axis() == axis {
                by_class.entry(wire.class()).or_default().push(wire);
            }
        }
        let mut groups = Vec::new();
        let mut base = 0;
        for (class, mut tracks) in by_class {
            tracks.sort_by_key(|w| (w.side, w.index, w.slot));
            let group = TrackGroup {
                span: segment_span(&class, self.cluster, self.separate_taps),
                base,
                segment: self.segments.id(&class)?,
                tracks,
            };
            base += group.width();
            groups.push(group);
        }
        Ok(groups)
    }

    fn add_tracks(&self, inst: &mut Instances) -> SynthResult<()> {
        let h_groups = self.track_groups(Axis::Horizontal)?;
        let v_groups = self.track_groups(Axis::Vertical)?;
        inst.h_width = h_groups.iter().map(TrackGroup::width).sum();
        inst.v_width = v_groups.iter().map(TrackGroup::width).sum();

        let rows = 0..self.grid.height() as i32;
        let margin = (TrackGroup::longest(&h_groups), TrackGroup::longest(&v_groups));
        for (x, y) in self.grid.extended(margin.0, margin.1) {
            if rows.contains(&y) {
                for group in &h_groups {
                    for (rank, wire) in group.tracks.iter().enumerate() {
                        self.place_horizontal(inst, group, rank, wire, (x, y))?;
                    }
                }
            }
            if x < 0 || x > self.grid.max_x() {
                continue;
            }
            for group in &v_groups {
                for (rank, wire) in group.tracks.iter().enumerate() {
                    self.place_vertical(inst, group, rank, wire, (x, y))?;
                }
            }
        }
        Ok(())
    }

    fn place_horizontal(
        &self,
        inst: &mut Instances,
        group: &TrackGroup,
        rank: usize,
        wire: &WireNode,
        (x, y): Coords,
    ) -> SynthResult<()> {
        let max_x = self.grid.max_x();
        let max_y = self.grid.max_y();
        let span = group.span as i32;
        let increasing = wire.side.is_increasing();
        let (lo, hi) = if increasing { (x, x + span - 1) } else { (x - span + 1, x) };
        if lo > max_x || hi < 1 || y > max_y {
            return Ok(());
        }
        let (lo, hi) = (lo.clamp(1, max_x), hi.clamp(1, max_x));
        let id = inst.push(
            NodeName::Wire(*wire),
            (x, y),
            RrNode {
                node_type: NodeType::Chan(wire.side),
                capacity: 1,
                low: (lo, y),
                high: (hi, y),
                on_side: false,
                ptc: group.ptc(x, rank),
                segment: Some(group.segment),
            },
        );

        let io_row = if y == 0 {
            0
        } else if y == max_y {
            y + 1
        } else {
            return Ok(());
        };
        // pads load the wire's far end and drive its start
        let (end, start) = if increasing { (hi, lo) } else { (lo, hi) };
        let cb = self.switches.id(&SwitchKind::ConnectionBlock)?;
        let mux = self.switches.id(&SwitchKind::Wire(wire.at_tap(0).class()))?;
        inst.io_fanin.entry((end, io_row)).or_default().push((id, cb));
        inst.io_fanout.entry((start, io_row)).or_default().push((id, mux));
        Ok(())
    }

    fn place_vertical(
        &self,
        inst: &mut Instances,
        group: &TrackGroup,
        rank: usize,
        wire: &WireNode,
        (x, y): Coords,
    ) -> SynthResult<()> {
        let max_x = self.grid.max_x();
        let max_y = self.grid.max_y();
        let span = group.span as i32;
        let increasing = wire.side.is_increasing();
        let (lo, hi) = if increasing { (y, y + span - 1) } else { (y - span + 1, y) };
        if lo > max_y || hi < 1 {
            return Ok(());
        }
        let (lo, hi) = (lo.clamp(1, max_y), hi.clamp(1, max_y));
        let id = inst.push(
            NodeName::Wire(*wire),
            (x, y),
            RrNode {
                node_type: NodeType::Chan(wire.side),
                capacity: 1,
                low: (x, lo),
                high: (x, hi),
                on_side: false,
                ptc: group.ptc(y, rank),
                segment: Some(group.segment),
            },
        );

        let io_col = if x == 0 {
            0
        } else if x == max_x {
            x + 1
        } else {
            return Ok(());
        };
        let cb = self.switches.id(&SwitchKind::ConnectionBlock)?;
        let mux = self.switches.id(&SwitchKind::Wire(wire.at_tap(0).class()))?;
        let top = self.grid.height() as i32 - 1;
        for tap in 0..self.cluster.tap_count as i32 {
            let row = if increasing { hi - tap } else { lo + tap };
            if row <= 0 || row >= top {
                break;
            }
            inst.io_fanin.entry((io_col, row)).or_default().push((id, cb));
        }
        let start = if increasing { lo } else { hi };
        inst.io_fanout.entry((io_col, start)).or_default().push((id, mux));
        Ok(())
    }

    /// With separate taps, a tap node whose remaining run would leave the
    /// array is cut short there and takes over the last tap's fanout.
    fn edge_source(&self, name: &NodeName, (_, y): Coords) -> NodeName {
        let NodeName::Wire(wire) = *name else {
            return *name;
        };
        if !self.separate_taps || wire.axis() != Axis::Vertical {
            return *name;
        }
        let last = wire.length.min(self.cluster.tap_count).saturating_sub(1);
        if wire.tap == last {
            return *name;
        }
        let span = segment_span(&wire.class(), self.cluster, true) as i32;
        let top = self.grid.height() as i32 - 1;
        let premature = match wire.side {
            Side::Up => y + span >= top,
            Side::Down => y - span <= 1,
            Side::Left | Side::Right => false,
        };
        if premature {
            NodeName::Wire(wire.at_tap(last))
        } else {
            *name
        }
    }

    /// Pulls wire-to-wire offsets that leave the array back onto its
    /// outermost channel.
    fn clamp_offset(&self, from: NodeKind, to: NodeKind, (x, y): Coords, (dx, dy): Coords) -> Coords {
        match (from, to) {
            (NodeKind::HTrack, NodeKind::VTrack) => {
                let max_x = self.grid.max_x();
                let dx = if x + dx > max_x {
                    max_x - x
                } else if x + dx < 0 {
                    -x
                } else {
                    dx
                };
                (dx, dy)
            }
            (NodeKind::VTrack, NodeKind::HTrack) => {
                let max_y = self.grid.max_y();
                let dy = if y + dy > max_y {
                    max_y - y
                } else if y + dy < 0 {
                    -y
                } else {
                    dy
                };
                (dx, dy)
            }
            _ => (dx, dy),
        }
    }

    /// Resolves all edges, keyed by `(source, sink)` with the switch id.
    ///
    /// Edges collapsing onto the same pair keep the first switch seen.
    fn resolve_edges(&self, inst: &Instances) -> SynthResult<BTreeMap<(u32, u32), u32>> {
        let mut edges = BTreeMap::new();
        for (_, node) in self.graph.nodes() {
            let Some(instances) = inst.ids.get(&node.name) else {
                continue;
            };
            for (&(x, y), &src) in instances {
                let from = self.edge_source(&node.name, (x, y));
                let Some(from) = self.graph.id(&from) else {
                    continue;
                };
                for edge in self.graph.outgoing(from) {
                    let target = self.graph.node(edge.dst);
                    let (dx, dy) = self.clamp_offset(node.kind, target.kind, (x, y), edge.offset);
                    let Some(dst) = inst.lookup(&target.name, (x + dx, y + dy)) else {
                        continue;
                    };
                    if dst == src {
                        continue;
                    }
                    let switch = self.switches.id(&edge.switch)?;
                    edges.entry((src, dst)).or_insert(switch);
                }
            }
        }

        let capacity = self.cluster.io_capacity;
        for (&at, drivers) in &inst.io_fanin {
            for i in 0..capacity {
                for pin in [NodeName::PadInput(i), NodeName::PadClock(i)] {
                    let Some(dst) = inst.lookup(&pin, at) else {
                        continue;
                    };
                    for &(src, switch) in drivers {
                        edges.entry((src, dst)).or_insert(switch);
                    }
                }
            }
        }
        for (&at, loads) in &inst.io_fanout {
            for i in 0..capacity {
                let Some(src) = inst.lookup(&NodeName::PadOutput(i), at) else {
                    continue;
                };
                for &(dst, switch) in loads {
                    edges.entry((src, dst)).or_insert(switch);
                }
            }
        }
        Ok(edges)
    }

    fn render(
        &self,
        out: &mut String,
        arch_file: &str,
        inst: &Instances,
        edges: &BTreeMap<(u32, u32), u32>,
    ) -> fmt::Result {
        writeln!(
            out,
            "<rr_graph tool_name=\"vpr\" tool_version=\"8.0.0+unkown\" tool_comment=\"Generated from arch file {arch_file}\">"
        )?;
        self.render_channels(out, inst.h_width, inst.v_width)?;
        self.render_switches(out)?;
        self.render_segments(out)?;
        self.render_block_types(out)?;
        self.render_grid(out)?;

        let i2 = INDENT.repeat(2);
        let i3 = INDENT.repeat(3);
        writeln!(out, "{INDENT}<rr_nodes>")?;
        for (id, node) in inst.nodes.iter().enumerate() {
            writeln!(
                out,
                "{i2}<node id=\"{id}\" type=\"{}\" capacity=\"{}\">",
                node.node_type, node.capacity
            )?;
            let side = if node.on_side { "side=\"LEFT\" " } else { "" };
            writeln!(
                out,
                "{i3}<loc xlow=\"{}\" ylow=\"{}\" xhigh=\"{}\" yhigh=\"{}\" {side}ptc=\"{}\"/>",
                node.low.0, node.low.1, node.high.0, node.high.1, node.ptc
            )?;
            writeln!(out, "{i3}<timing R=\"0\" C=\"0\"/>")?;
            if let Some(segment) = node.segment {
                writeln!(out, "{i3}<segment segment_id=\"{segment}\"/>")?;
            }
            writeln!(out, "{i2}</node>")?;
        }
        writeln!(out, "{INDENT}</rr_nodes>")?;

        writeln!(out, "{INDENT}<rr_edges>")?;
        for (&(src, dst), switch) in edges {
            writeln!(
                out,
                "{i2}<edge src_node=\"{src}\" sink_node=\"{dst}\" switch_id=\"{switch}\"/>"
            )?;
        }
        writeln!(out, "{INDENT}</rr_edges>")?;
        out.write_str("</rr_graph>\n")
    }

    fn render_channels(&self, out: &mut String, h_width: u32, v_width: u32) -> fmt::Result {
        writeln!(out, "{INDENT}<channels>")?;
        writeln!(
            out,
            "{INDENT}{INDENT}<channel chan_width_max=\"{}\" x_min=\"{h_width}\" y_min=\"{v_width}\" x_max=\"{h_width}\" y_max=\"{v_width}\"/>",
            h_width.max(v_width)
        )?;
        let i3 = INDENT.repeat(3);
        for index in 0..self.grid.height() {
            writeln!(out, "{i3}<x_list index=\"{index}\" info=\"{h_width}\"/>")?;
        }
        for index in 0..self.grid.width() {
            writeln!(out, "{i3}<y_list index=\"{index}\" info=\"{v_width}\"/>")?;
        }
        writeln!(out, "{INDENT}</channels>")
    }

    fn render_switches(&self, out: &mut String) -> fmt::Result {
        let i2 = INDENT.repeat(2);
        let i3 = INDENT.repeat(3);
        writeln!(out, "{INDENT}<switches>")?;
        for entry in self.switches.entries() {
            writeln!(
                out,
                "{i2}<switch id=\"{}\" type=\"mux\" name=\"{}\">",
                entry.id,
                entry.name()
            )?;
            writeln!(
                out,
                "{i3}<timing R=\"0\" Cin=\"0\" Cout=\"0\" Tdel=\"{}\"/>",
                format_g(entry.delay)
            )?;
            writeln!(out, "{i3}<sizing mux_trans_size=\"0\" buf_size=\"0\"/>")?;
            writeln!(out, "{i2}</switch>")?;
        }
        writeln!(out, "{INDENT}</switches>")
    }

    fn render_segments(&self, out: &mut String) -> fmt::Result {
        let i2 = INDENT.repeat(2);
        writeln!(out, "{INDENT}<segments>")?;
        for (id, class) in self.segments.classes().iter().enumerate() {
            writeln!(out, "{i2}<segment id=\"{id}\" name=\"{class}\">")?;
            writeln!(out, "{i2}{INDENT}<timing R_per_meter=\"0\" C_per_meter=\"0\"/>")?;
            writeln!(out, "{i2}</segment>")?;
        }
        writeln!(out, "{INDENT}</segments>")
    }

    fn render_block_types(&self, out: &mut String) -> fmt::Result {
        let i2 = INDENT.repeat(2);
        let i3 = INDENT.repeat(3);
        let i4 = INDENT.repeat(4);
        writeln!(out, "{INDENT}<block_types>")?;
        writeln!(
            out,
            "{i2}<block_type id=\"{}\" name=\"{}\" width=\"1\" height=\"1\"/>",
            BlockType::Empty.id(),
            BlockType::Empty.name()
        )?;

        writeln!(
            out,
            "{i2}<block_type id=\"{}\" name=\"{}\" width=\"1\" height=\"1\">",
            BlockType::Io.id(),
            BlockType::Io.name()
        )?;
        let mut ptc = 0;
        for i in 0..self.cluster.io_capacity {
            let pins = [("INPUT", "outpad"), ("OUTPUT", "inpad"), ("INPUT", "clock")];
            for (class, port) in pins {
                writeln!(out, "{i3}<pin_class type=\"{class}\">")?;
                writeln!(out, "{i4}<pin ptc=\"{ptc}\">io[{i}].{port}[0]</pin>")?;
                writeln!(out, "{i3}</pin_class>")?;
                ptc += 1;
            }
        }
        writeln!(out, "{i2}</block_type>")?;

        writeln!(
            out,
            "{i2}<block_type id=\"{}\" name=\"{}\" width=\"1\" height=\"1\">",
            BlockType::Clb.id(),
            BlockType::Clb.name()
        )?;
        let outputs = self.cluster.n * self.cluster.outputs;
        let mut ptc = 0;
        let classes = [
            ("INPUT", "I", self.cluster.inputs),
            ("OUTPUT", "O", outputs),
            ("INPUT", "clk", 1),
        ];
        for (class, port, width) in classes {
            writeln!(out, "{i3}<pin_class type=\"{class}\">")?;
            for bit in 0..width {
                writeln!(out, "{i4}<pin ptc=\"{ptc}\">clb.{port}[{bit}]</pin>")?;
                ptc += 1;
            }
            writeln!(out, "{i3}</pin_class>")?;
        }
        writeln!(out, "{i2}</block_type>")?;
        writeln!(out, "{INDENT}</block_types>")
    }

    fn render_grid(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "{INDENT}<grid>")?;
        for ((x, y), block) in self.grid.iter() {
            writeln!(
                out,
                "{INDENT}{INDENT}<grid_loc x=\"{x}\" y=\"{y}\" block_type_id=\"{}\" width_offset=\"0\" height_offset=\"0\"/>",
                block.id()
            )?;
        }
        writeln!(out, "{INDENT}</grid>")
    }
}
