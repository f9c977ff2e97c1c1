//! Architecture description for the place-and-route tool.
//!
//! The description carries what the router needs besides the rr-graph:
//! the grid layout rules, the switch and segment lists with their lumped
//! delays, and the I/O and cluster block definitions with logic timing.
//! It is also the record a later run inherits delays from, so its
//! switch list can be read back with [`read_switch_delays`].

use crate::grid::Grid;
use crate::tables::{format_g, segment_span, SegmentTable, SwitchTable};
use std::fmt::{self, Write as _};
use strata_common::{Axis, DelayRecord, SwitchKind, SynthResult, SynthesisError, WireClass};
use strata_config::{Cluster, LogicDelays};
use strata_spice::{BLE_MUX, LUT_ACCESS};
use tracing::debug;

const INDENT: &str = "    ";

const IO_PRIORITY: u32 = 100;
const CLB_PRIORITY: u32 = 10;

/// Renders the architecture description of a synthesized architecture.
pub struct ArchitectureWriter<'a> {
    cluster: &'a Cluster,
    grid: &'a Grid,
    switches: &'a SwitchTable,
    segments: &'a SegmentTable,
    separate_taps: bool,
}

/// Delays of the cluster-internal paths.
struct LocalDelays {
    ble_mux: f64,
    lut_access: f64,
    feedback: f64,
}

impl<'a> ArchitectureWriter<'a> {
    /// Creates a writer over the same tables the rr-graph was exported with.
    pub fn new(
        cluster: &'a Cluster,
        grid: &'a Grid,
        switches: &'a SwitchTable,
        segments: &'a SegmentTable,
        separate_taps: bool,
    ) -> Self {
        Self {
            cluster,
            grid,
            switches,
            segments,
            separate_taps,
        }
    }

    /// Renders the description.
    ///
    /// `delays` must hold the measured BLE-mux and LUT-access delays; the
    /// local feedback path is charged the connection-block delay.
    pub fn render(&self, logic: &LogicDelays, delays: &DelayRecord) -> SynthResult<String> {
        let required = |name: &str| {
            delays
                .get(name)
                .ok_or_else(|| SynthesisError::export(format!("no delay recorded for {name}")))
        };
        let local = LocalDelays {
            ble_mux: required(BLE_MUX)?,
            lut_access: required(LUT_ACCESS)?,
            feedback: self
                .switches
                .entries()
                .iter()
                .find(|e| e.kind == SwitchKind::ConnectionBlock)
                .map(|e| e.delay)
                .unwrap_or_default(),
        };
        let mut out = String::new();
        self.write(&mut out, logic, &local)
            .map_err(|e| SynthesisError::export(format!("cannot render architecture: {e}")))?;
        debug!(bytes = out.len(), "rendered architecture description");
        Ok(out)
    }

    fn write(&self, out: &mut String, logic: &LogicDelays, local: &LocalDelays) -> fmt::Result {
        writeln!(out, "<architecture>")?;
        writeln!(out, "{INDENT}<models/>")?;
        self.write_layout(out)?;
        self.write_device(out)?;
        self.write_switchlist(out)?;
        self.write_segmentlist(out)?;
        writeln!(out, "{INDENT}<complexblocklist>")?;
        self.write_io(out, logic)?;
        self.write_clb(out, logic, local)?;
        writeln!(out, "{INDENT}</complexblocklist>")?;
        writeln!(out, "</architecture>")
    }

    fn write_layout(&self, out: &mut String) -> fmt::Result {
        let i2 = INDENT.repeat(2);
        let i3 = INDENT.repeat(3);
        let (w, h) = (self.grid.width(), self.grid.height());
        writeln!(out, "{INDENT}<layout>")?;
        writeln!(out, "{i2}<fixed_layout name=\"fix\" width=\"{w}\" height=\"{h}\">")?;
        writeln!(out, "{i3}<perimeter type=\"io\" priority=\"{IO_PRIORITY}\"/>")?;
        if self.grid.cut_corners() {
            writeln!(out, "{i3}<corners type=\"EMPTY\" priority=\"{}\"/>", IO_PRIORITY + 1)?;
        }
        if self.grid.top_bottom_io() {
            for x in [0, w - 1] {
                writeln!(
                    out,
                    "{i3}<col type=\"EMPTY\" startx=\"{x}\" starty=\"1\" priority=\"{}\"/>",
                    IO_PRIORITY + 2
                )?;
            }
        }
        writeln!(out, "{i3}<fill type=\"clb\" priority=\"{CLB_PRIORITY}\"/>")?;
        writeln!(out, "{i2}</fixed_layout>")?;
        writeln!(out, "{INDENT}</layout>")
    }

    fn write_device(&self, out: &mut String) -> fmt::Result {
        let i2 = INDENT.repeat(2);
        writeln!(out, "{INDENT}<device>")?;
        writeln!(out, "{i2}<sizing R_minW_nmos=\"0\" R_minW_pmos=\"0\"/>")?;
        writeln!(out, "{i2}<area grid_logic_tile_area=\"0\"/>")?;
        writeln!(out, "{i2}<chan_width_distr>")?;
        writeln!(out, "{i2}{INDENT}<x distr=\"uniform\" peak=\"1.000000\"/>")?;
        writeln!(out, "{i2}{INDENT}<y distr=\"uniform\" peak=\"1.000000\"/>")?;
        writeln!(out, "{i2}</chan_width_distr>")?;
        writeln!(out, "{i2}<switch_block type=\"wilton\" fs=\"3\"/>")?;
        writeln!(out, "{i2}<connection_block input_switch_name=\"cb\"/>")?;
        writeln!(out, "{INDENT}</device>")
    }

    /// Sizes are zero: area is accounted for by the tile layout and all
    /// delay is lumped into `Tdel`.
    fn write_switchlist(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "{INDENT}<switchlist>")?;
        for entry in self.switches.entries() {
            if entry.kind == SwitchKind::Delayless {
                continue;
            }
            writeln!(
                out,
                "{INDENT}{INDENT}<switch type=\"mux\" name=\"{}\" R=\"0\" Cin=\"0\" Cout=\"0\" Tdel=\"{}\" mux_trans_size=\"0\" buf_size=\"0\"/>",
                entry.name(),
                format_g(entry.delay)
            )?;
        }
        writeln!(out, "{INDENT}</switchlist>")
    }

    fn write_segmentlist(&self, out: &mut String) -> fmt::Result {
        let i2 = INDENT.repeat(2);
        let i3 = INDENT.repeat(3);
        writeln!(out, "{INDENT}<segmentlist>")?;
        for class in self.segments.classes() {
            let span = segment_span(class, self.cluster, self.separate_taps);
            writeln!(
                out,
                "{i2}<segment freq=\"1.0\" length=\"{span}\" type=\"unidir\" Rmetal=\"0\" Cmetal=\"0\" name=\"{class}\">"
            )?;
            writeln!(out, "{i3}<mux name=\"{class}\"/>")?;
            writeln!(out, "{i3}<sb type=\"pattern\">{}</sb>", sb_pattern(span))?;
            writeln!(
                out,
                "{i3}<cb type=\"pattern\">{}</cb>",
                self.cb_pattern(class, span)
            )?;
            writeln!(out, "{i2}</segment>")?;
        }
        writeln!(out, "{INDENT}</segmentlist>")
    }

    /// Connection-block population along a segment.
    ///
    /// Horizontal wires and separate tap nodes connect at both ends. A
    /// vertical wire with merged taps connects at its start and at every
    /// tap position before its end.
    fn cb_pattern(&self, class: &WireClass, span: u32) -> String {
        let mut bits = vec![false; span as usize];
        bits[0] = true;
        if class.axis == Axis::Vertical && !self.separate_taps {
            let taps = self.cluster.tap_count.min(span - 1) as usize;
            for bit in bits.iter_mut().rev().take(taps) {
                *bit = true;
            }
        } else if span > 1 {
            bits[span as usize - 1] = true;
        }
        render_bits(&bits)
    }

    fn write_io(&self, out: &mut String, logic: &LogicDelays) -> fmt::Result {
        let i2 = INDENT.repeat(2);
        let i3 = INDENT.repeat(3);
        let i4 = INDENT.repeat(4);
        let i5 = INDENT.repeat(5);
        writeln!(
            out,
            "{i2}<pb_type name=\"io\" capacity=\"{}\">",
            self.cluster.io_capacity
        )?;
        writeln!(out, "{i3}<input name=\"outpad\" num_pins=\"1\"/>")?;
        writeln!(out, "{i3}<output name=\"inpad\" num_pins=\"1\"/>")?;
        writeln!(out, "{i3}<clock name=\"clock\" num_pins=\"1\"/>")?;

        writeln!(out, "{i3}<mode name=\"inpad\">")?;
        writeln!(out, "{i4}<pb_type name=\"inpad\" blif_model=\".input\" num_pb=\"1\">")?;
        writeln!(out, "{i5}<output name=\"inpad\" num_pins=\"1\"/>")?;
        writeln!(out, "{i4}</pb_type>")?;
        writeln!(out, "{i4}<interconnect>")?;
        writeln!(
            out,
            "{i5}<direct name=\"inpad\" input=\"inpad.inpad\" output=\"io.inpad\">"
        )?;
        writeln!(
            out,
            "{i5}{INDENT}<delay_constant max=\"{}\" in_port=\"inpad.inpad\" out_port=\"io.inpad\"/>",
            format_g(logic.inpad)
        )?;
        writeln!(out, "{i5}</direct>")?;
        writeln!(out, "{i4}</interconnect>")?;
        writeln!(out, "{i3}</mode>")?;

        writeln!(out, "{i3}<mode name=\"outpad\">")?;
        writeln!(out, "{i4}<pb_type name=\"outpad\" blif_model=\".output\" num_pb=\"1\">")?;
        writeln!(out, "{i5}<input name=\"outpad\" num_pins=\"1\"/>")?;
        writeln!(out, "{i4}</pb_type>")?;
        writeln!(out, "{i4}<interconnect>")?;
        writeln!(
            out,
            "{i5}<direct name=\"outpad\" input=\"io.outpad\" output=\"outpad.outpad\">"
        )?;
        writeln!(
            out,
            "{i5}{INDENT}<delay_constant max=\"{}\" in_port=\"io.outpad\" out_port=\"outpad.outpad\"/>",
            format_g(logic.outpad)
        )?;
        writeln!(out, "{i5}</direct>")?;
        writeln!(out, "{i4}</interconnect>")?;
        writeln!(out, "{i3}</mode>")?;

        writeln!(
            out,
            "{i3}<fc in_type=\"frac\" in_val=\"1.0\" out_type=\"frac\" out_val=\"1.0\"/>"
        )?;
        writeln!(out, "{i3}<pinlocations pattern=\"spread\"/>")?;
        writeln!(out, "{i2}</pb_type>")
    }

    fn write_clb(&self, out: &mut String, logic: &LogicDelays, local: &LocalDelays) -> fmt::Result {
        let c = self.cluster;
        let last = c.n - 1;
        let i2 = INDENT.repeat(2);
        let i3 = INDENT.repeat(3);
        let i4 = INDENT.repeat(4);
        let i5 = INDENT.repeat(5);
        let i6 = INDENT.repeat(6);

        writeln!(out, "{i2}<pb_type name=\"clb\">")?;
        writeln!(
            out,
            "{i3}<input name=\"I\" num_pins=\"{}\" equivalent=\"full\"/>",
            c.inputs
        )?;
        writeln!(
            out,
            "{i3}<output name=\"O\" num_pins=\"{}\" equivalent=\"none\"/>",
            c.n * c.outputs
        )?;
        writeln!(out, "{i3}<clock name=\"clk\" num_pins=\"1\"/>")?;

        writeln!(out, "{i3}<pb_type name=\"ble\" num_pb=\"{}\">", c.n)?;
        writeln!(out, "{i4}<input name=\"in\" num_pins=\"{}\"/>", c.k)?;
        writeln!(out, "{i4}<output name=\"out\" num_pins=\"{}\"/>", c.outputs)?;
        writeln!(out, "{i4}<clock name=\"clk\" num_pins=\"1\"/>")?;

        writeln!(
            out,
            "{i4}<pb_type name=\"lut\" blif_model=\".names\" num_pb=\"1\" class=\"lut\">"
        )?;
        writeln!(
            out,
            "{i5}<input name=\"in\" num_pins=\"{}\" port_class=\"lut_in\"/>",
            c.k
        )?;
        writeln!(out, "{i5}<output name=\"out\" num_pins=\"1\" port_class=\"lut_out\"/>")?;
        writeln!(
            out,
            "{i5}<delay_matrix type=\"max\" in_port=\"lut.in\" out_port=\"lut.out\">"
        )?;
        for _ in 0..c.k {
            writeln!(out, "{i6}{}", format_g(logic.lut))?;
        }
        writeln!(out, "{i5}</delay_matrix>")?;
        writeln!(out, "{i4}</pb_type>")?;

        writeln!(
            out,
            "{i4}<pb_type name=\"ff\" blif_model=\".latch\" num_pb=\"1\" class=\"flipflop\">"
        )?;
        writeln!(out, "{i5}<input name=\"D\" num_pins=\"1\" port_class=\"D\"/>")?;
        writeln!(out, "{i5}<output name=\"Q\" num_pins=\"1\" port_class=\"Q\"/>")?;
        writeln!(out, "{i5}<clock name=\"clk\" num_pins=\"1\" port_class=\"clock\"/>")?;
        writeln!(
            out,
            "{i5}<T_setup value=\"{}\" port=\"ff.D\" clock=\"clk\"/>",
            format_g(logic.ff_setup)
        )?;
        writeln!(
            out,
            "{i5}<T_clock_to_Q max=\"{}\" port=\"ff.Q\" clock=\"clk\"/>",
            format_g(logic.ff_clk_to_q)
        )?;
        writeln!(out, "{i4}</pb_type>")?;

        writeln!(out, "{i4}<interconnect>")?;
        writeln!(
            out,
            "{i5}<direct name=\"lut_access\" input=\"ble.in\" output=\"lut.in\">"
        )?;
        writeln!(
            out,
            "{i6}<delay_constant max=\"{}\" in_port=\"ble.in\" out_port=\"lut.in\"/>",
            format_g(local.lut_access)
        )?;
        writeln!(out, "{i5}</direct>")?;
        writeln!(out, "{i5}<direct name=\"lut_to_ff\" input=\"lut.out\" output=\"ff.D\"/>")?;
        writeln!(out, "{i5}<direct name=\"clock\" input=\"ble.clk\" output=\"ff.clk\"/>")?;
        writeln!(
            out,
            "{i5}<mux name=\"ble_mux\" input=\"ff.Q lut.out\" output=\"ble.out\">"
        )?;
        for port in ["ff.Q", "lut.out"] {
            writeln!(
                out,
                "{i6}<delay_constant max=\"{}\" in_port=\"{port}\" out_port=\"ble.out\"/>",
                format_g(local.ble_mux)
            )?;
        }
        writeln!(out, "{i5}</mux>")?;
        writeln!(out, "{i4}</interconnect>")?;
        writeln!(out, "{i3}</pb_type>")?;

        writeln!(out, "{i3}<interconnect>")?;
        writeln!(
            out,
            "{i4}<complete name=\"crossbar\" input=\"clb.I ble[{last}:0].out\" output=\"ble[{last}:0].in\">"
        )?;
        writeln!(
            out,
            "{i5}<delay_constant max=\"0\" in_port=\"clb.I\" out_port=\"ble[{last}:0].in\"/>"
        )?;
        writeln!(
            out,
            "{i5}<delay_constant max=\"{}\" in_port=\"ble[{last}:0].out\" out_port=\"ble[{last}:0].in\"/>",
            format_g(local.feedback)
        )?;
        writeln!(out, "{i4}</complete>")?;
        writeln!(
            out,
            "{i4}<complete name=\"clks\" input=\"clb.clk\" output=\"ble[{last}:0].clk\"/>"
        )?;
        writeln!(
            out,
            "{i4}<direct name=\"outputs\" input=\"ble[{last}:0].out\" output=\"clb.O\"/>"
        )?;
        writeln!(out, "{i3}</interconnect>")?;
        writeln!(
            out,
            "{i3}<fc in_type=\"frac\" in_val=\"1.0\" out_type=\"frac\" out_val=\"1.0\"/>"
        )?;
        writeln!(out, "{i3}<pinlocations pattern=\"spread\"/>")?;
        writeln!(out, "{i2}</pb_type>")
    }
}

/// Switch-block population: a segment meets switch blocks at both ends.
fn sb_pattern(span: u32) -> String {
    let mut bits = vec![false; span as usize + 1];
    bits[0] = true;
    bits[span as usize] = true;
    render_bits(&bits)
}

fn render_bits(bits: &[bool]) -> String {
    bits.iter()
        .map(|&b| if b { "1" } else { "0" })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads the switch delays from an architecture description.
///
/// Only the first switch list is read. Fails if a switch line lacks a
/// name or a readable `Tdel`.
pub fn read_switch_delays(text: &str) -> SynthResult<DelayRecord> {
    let mut delays = DelayRecord::new();
    for line in text.lines() {
        if line.contains("</switchlist>") {
            break;
        }
        if !line.contains("<switch ") {
            continue;
        }
        let name = attribute(line, "name")
            .ok_or_else(|| SynthesisError::export(format!("switch without a name: {}", line.trim())))?;
        let delay = attribute(line, "Tdel")
            .and_then(|t| t.parse::<f64>().ok())
            .ok_or_else(|| SynthesisError::export(format!("switch {name} has no readable Tdel")))?;
        delays.insert(name, delay);
    }
    if delays.is_empty() {
        return Err(SynthesisError::export(
            "architecture description has no switch delays",
        ));
    }
    Ok(delays)
}

/// Rewrites the `fixed_layout` dimensions of an architecture description.
pub fn resize_layout(text: &str, width: u32, height: u32) -> SynthResult<String> {
    let mut found = false;
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if line.contains("<fixed_layout") {
            found = true;
            let line = replace_attribute(line, "width", &width.to_string());
            out.push_str(&replace_attribute(&line, "height", &height.to_string()));
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    if !found {
        return Err(SynthesisError::export(
            "architecture description has no fixed_layout",
        ));
    }
    Ok(out)
}

fn attribute<'t>(line: &'t str, key: &str) -> Option<&'t str> {
    let marker = format!(" {key}=\"");
    let start = line.find(&marker)? + marker.len();
    let len = line[start..].find('"')?;
    Some(&line[start..start + len])
}

fn replace_attribute(line: &str, key: &str, value: &str) -> String {
    match attribute(line, key) {
        Some(old) => {
            let marker = format!(" {key}=\"");
            line.replacen(&format!("{marker}{old}\""), &format!("{marker}{value}\""), 1)
        }
        None => line.to_string(),
    }
}
