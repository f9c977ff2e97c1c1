//! Physical layout of a cluster tile and the area-balancing loop.
//!
//! Multiplexers read off the routing graph are sized and stacked into
//! columns beside the logic; the stack width fixes the tile width. The
//! [`Balancer`] grows unit-length wires until the metal they need catches
//! up with the active tile area.

#![warn(missing_docs)]

pub mod log;
pub mod mux;
pub mod padding;
pub mod stack;
pub mod tile;

pub use log::{PaddingImport, PaddingLog};
pub use mux::{mux_dimensions, mux_sizes, MuxId, MuxSizes};
pub use padding::{BalancedArchitecture, Balancer, PaddingStep};
pub use stack::{stack_muxes, Layout, MuxPlacement};
pub use tile::{metal_dimensions, square_grid, tile_dimensions, Dimensions};
