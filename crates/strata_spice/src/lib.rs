//! Delay characterization by circuit simulation.
//!
//! For every wire type of a balanced architecture a representative
//! [`MeasurementNet`] is extracted from the routing graph and the mux
//! stack: the driving mux and buffer, the wire itself and the mux inputs
//! it loads, each placed at its stacked pin position. Nets are rendered
//! as SPICE decks and run through a [`CircuitSimulator`]; the measured
//! delays come back as a [`DelayRecord`](strata_common::DelayRecord).

#![warn(missing_docs)]

pub mod characterize;
pub mod deck;
pub mod net;
pub mod netlist;
pub mod simulator;

pub use characterize::{CharacterizationPlan, Characterizer, BLE_MUX, LUT_ACCESS};
pub use deck::{measure_names, render_deck, DeckKind, DeckParams};
pub use net::{Layer, MeasurementNet, MuxLoad, MuxState, NetNode};
pub use netlist::{ConnectionLoad, NetBuilder, WireNet};
pub use simulator::{parse_listing, CircuitSimulator, LocalWireQuery, ProcessSimulator, SimulationJob};
