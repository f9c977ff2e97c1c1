//! Routing node identifiers and kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use strata_common::{Axis, Side, WireClass};

/// One wire segment instance driven from a cluster slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WireNode {
    /// BLE slot whose switch-block mux drives the wire.
    pub slot: u32,
    /// Propagation side.
    pub side: Side,
    /// Length in tiles.
    pub length: u32,
    /// Instance index within its type and side.
    pub index: u32,
    /// Tap position; always 0 for horizontal wires.
    pub tap: u32,
}

impl WireNode {
    /// Returns the channel axis.
    pub fn axis(&self) -> Axis {
        self.side.axis()
    }

    /// Returns the wire class naming the switch that drives this node.
    pub fn class(&self) -> WireClass {
        match self.axis() {
            Axis::Horizontal => WireClass::horizontal(self.length),
            Axis::Vertical => WireClass::vertical(self.length, self.tap),
        }
    }

    /// Returns the same wire as seen from another slot.
    pub fn in_slot(self, slot: u32) -> Self {
        Self { slot, ..self }
    }

    /// Returns the same wire at another tap.
    pub fn at_tap(self, tap: u32) -> Self {
        Self { tap, ..self }
    }
}

/// Structured logical identifier of a routing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeName {
    /// A wire segment.
    Wire(WireNode),
    /// Connection-block mux output feeding a cluster input pin.
    ClusterInput {
        /// BLE slot of the pin's equivalence group.
        slot: u32,
        /// Pin within the group.
        pin: u32,
    },
    /// BLE output pin.
    ClusterOutput {
        /// BLE slot.
        slot: u32,
        /// Output within the BLE.
        output: u32,
    },
    /// Cluster clock pin.
    ClusterClock,
    /// I/O pad input pin (signal leaving the fabric).
    PadInput(u32),
    /// I/O pad output pin (signal entering the fabric).
    PadOutput(u32),
    /// I/O pad clock pin.
    PadClock(u32),
    /// Sink of all cluster inputs.
    ClusterInputSink,
    /// Source of all cluster outputs.
    ClusterOutputSource,
    /// Sink of the cluster clock.
    ClusterClockSink,
    /// Sink of one output pad.
    PadInputSink(u32),
    /// Source of one input pad.
    PadOutputSource(u32),
    /// Sink of one pad clock.
    PadClockSink(u32),
}

impl NodeName {
    /// Returns the node kind implied by the name.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Wire(w) => match w.axis() {
                Axis::Horizontal => NodeKind::HTrack,
                Axis::Vertical => NodeKind::VTrack,
            },
            Self::ClusterInput { .. } => NodeKind::CbOut,
            Self::ClusterOutput { .. } => NodeKind::ClbOut,
            Self::ClusterClock => NodeKind::ClbClk,
            Self::PadInput(_) => NodeKind::IoPadIn,
            Self::PadOutput(_) => NodeKind::IoPadOut,
            Self::PadClock(_) => NodeKind::IoClk,
            Self::ClusterInputSink
            | Self::ClusterClockSink
            | Self::PadInputSink(_)
            | Self::PadClockSink(_) => NodeKind::Sink,
            Self::ClusterOutputSource | Self::PadOutputSource(_) => NodeKind::Source,
        }
    }

    /// Returns the wire, if this is a wire node.
    pub fn as_wire(&self) -> Option<&WireNode> {
        match self {
            Self::Wire(w) => Some(w),
            _ => None,
        }
    }

    /// Returns the BLE slot for slot-local nodes.
    pub fn slot(&self) -> Option<u32> {
        match self {
            Self::Wire(w) => Some(w.slot),
            Self::ClusterInput { slot, .. } | Self::ClusterOutput { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    /// Returns the same slot-local node in another slot; other nodes are unchanged.
    pub fn in_slot(self, slot: u32) -> Self {
        match self {
            Self::Wire(w) => Self::Wire(w.in_slot(slot)),
            Self::ClusterInput { pin, .. } => Self::ClusterInput { slot, pin },
            Self::ClusterOutput { output, .. } => Self::ClusterOutput { slot, output },
            other => other,
        }
    }

    /// Returns `true` for I/O tile pins, sinks and sources.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::PadInput(_)
                | Self::PadOutput(_)
                | Self::PadClock(_)
                | Self::PadInputSink(_)
                | Self::PadOutputSource(_)
                | Self::PadClockSink(_)
        )
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wire(w) => {
                write!(
                    f,
                    "ble_{}_{}{}_{}_{}",
                    w.slot,
                    w.axis().letter(),
                    w.length,
                    w.side.letter(),
                    w.index
                )?;
                if w.axis() == Axis::Vertical {
                    write!(f, "_tap_{}", w.tap)?;
                }
                Ok(())
            }
            Self::ClusterInput { slot, pin } => write!(f, "ble_{slot}_cb_out_{pin}"),
            Self::ClusterOutput { slot, output } => write!(f, "ble_{slot}_o_{output}"),
            Self::ClusterClock => f.write_str("ble_clk"),
            Self::PadInput(i) => write!(f, "io_{i}_opad_in"),
            Self::PadOutput(i) => write!(f, "io_{i}_ipad_out"),
            Self::PadClock(i) => write!(f, "io_{i}_clk_in"),
            Self::ClusterInputSink => f.write_str("I_SINK"),
            Self::ClusterOutputSource => f.write_str("O_SOURCE"),
            Self::ClusterClockSink => f.write_str("CLK_SINK"),
            Self::PadInputSink(i) => write!(f, "IO_{i}_OPAD_SINK"),
            Self::PadOutputSource(i) => write!(f, "IO_{i}_IPAD_SOURCE"),
            Self::PadClockSink(i) => write!(f, "IO_{i}_CLK_SINK"),
        }
    }
}

/// The functional kind of a routing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Horizontal wire segment.
    HTrack,
    /// Vertical wire segment.
    VTrack,
    /// Connection-block output (cluster input pin).
    CbOut,
    /// BLE output pin.
    ClbOut,
    /// Cluster clock pin.
    ClbClk,
    /// I/O pad input pin.
    IoPadIn,
    /// I/O pad output pin.
    IoPadOut,
    /// I/O clock pin.
    IoClk,
    /// Equivalence-class sink.
    Sink,
    /// Equivalence-class source.
    Source,
}

impl NodeKind {
    /// Returns `true` for wire segments.
    pub fn is_track(self) -> bool {
        matches!(self, Self::HTrack | Self::VTrack)
    }
}

/// A node of the logical routing graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingNode {
    /// Unique logical identifier.
    pub name: NodeName,
    /// Functional kind.
    pub kind: NodeKind,
    /// Ordinal pin/track index within its kind.
    pub ptc: u32,
}
