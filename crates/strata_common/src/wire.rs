//! Wire direction vocabulary and switch naming.
//!
//! A routing wire runs along an [`Axis`] and propagates toward one [`Side`].
//! A [`WireClass`] names one wire type (axis, length and, for vertical
//! wires, the tap it is driven from); its display form (`H4`,
//! `V8_tap_0`) is the switch and segment name used in every exported
//! description.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the zero-delay switch joining pins to their sinks and sources.
pub const DELAYLESS_SWITCH: &str = "__vpr_delayless_switch__";

/// Name of the connection-block switch driving cluster input pins.
pub const CB_SWITCH: &str = "cb";

/// The axis a routing channel runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// A horizontal channel (`H` in composition files).
    Horizontal,
    /// A vertical channel (`V` in composition files).
    Vertical,
}

impl Axis {
    /// Returns the single-letter tag used in composition files and switch names.
    pub fn letter(self) -> char {
        match self {
            Self::Horizontal => 'H',
            Self::Vertical => 'V',
        }
    }

    /// Parses a direction tag.
    pub fn from_letter(tag: &str) -> Option<Self> {
        match tag {
            "H" => Some(Self::Horizontal),
            "V" => Some(Self::Vertical),
            _ => None,
        }
    }

    /// Returns the two propagation sides of this axis, decreasing first.
    pub fn sides(self) -> [Side; 2] {
        match self {
            Self::Horizontal => [Side::Left, Side::Right],
            Self::Vertical => [Side::Up, Side::Down],
        }
    }
}

/// The direction a unidirectional wire propagates toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Horizontal wire driven toward decreasing x.
    Left,
    /// Horizontal wire driven toward increasing x.
    Right,
    /// Vertical wire driven toward increasing y.
    Up,
    /// Vertical wire driven toward decreasing y.
    Down,
}

impl Side {
    /// Returns the axis this side belongs to.
    pub fn axis(self) -> Axis {
        match self {
            Self::Left | Self::Right => Axis::Horizontal,
            Self::Up | Self::Down => Axis::Vertical,
        }
    }

    /// Returns the single-letter tag (`L`, `R`, `U`, `D`).
    pub fn letter(self) -> char {
        match self {
            Self::Left => 'L',
            Self::Right => 'R',
            Self::Up => 'U',
            Self::Down => 'D',
        }
    }

    /// Returns `true` if the wire runs toward increasing coordinates.
    pub fn is_increasing(self) -> bool {
        matches!(self, Self::Right | Self::Up)
    }

    /// Returns the side on the same axis pointing the other way.
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

/// One wire type: axis, length in tiles and, for vertical wires, a tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WireClass {
    /// Channel axis.
    pub axis: Axis,
    /// Length in tiles.
    pub length: u32,
    /// Tap position for vertical wires, `None` for horizontal ones.
    pub tap: Option<u32>,
}

impl WireClass {
    /// A horizontal wire type of the given length.
    pub fn horizontal(length: u32) -> Self {
        Self {
            axis: Axis::Horizontal,
            length,
            tap: None,
        }
    }

    /// A vertical wire type of the given length, driven from `tap`.
    pub fn vertical(length: u32, tap: u32) -> Self {
        Self {
            axis: Axis::Vertical,
            length,
            tap: Some(tap),
        }
    }

    /// Returns the switch/segment name (`H4`, `V8_tap_0`).
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WireClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.axis.letter(), self.length)?;
        if let Some(tap) = self.tap {
            write!(f, "_tap_{tap}")?;
        }
        Ok(())
    }
}

impl FromStr for WireClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || format!("invalid wire class '{s}'");
        let axis = s.get(..1).and_then(Axis::from_letter).ok_or_else(bad)?;
        let rest = &s[1..];
        let (length, tap) = match rest.split_once("_tap_") {
            Some((length, tap)) => (length, Some(tap.parse::<u32>().map_err(|_| bad())?)),
            None => (rest, None),
        };
        let length = length.parse::<u32>().map_err(|_| bad())?;
        if axis == Axis::Horizontal && tap.is_some() {
            return Err(bad());
        }
        Ok(Self { axis, length, tap })
    }
}

/// The switch type an edge is programmed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SwitchKind {
    /// Zero-delay connection between a pin and its sink or source.
    Delayless,
    /// Connection-block multiplexer driving a cluster input pin.
    ConnectionBlock,
    /// Switch-block multiplexer driving a wire of the given class.
    Wire(WireClass),
}

impl SwitchKind {
    /// Returns the exported switch name.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SwitchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delayless => f.write_str(DELAYLESS_SWITCH),
            Self::ConnectionBlock => f.write_str(CB_SWITCH),
            Self::Wire(class) => write!(f, "{class}"),
        }
    }
}
