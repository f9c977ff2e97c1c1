//! Logical routing-resource graph of one cluster tile.
//!
//! The [`GraphBuilder`] turns a channel composition into a [`RoutingGraph`]:
//! pins, wire segments, connection-block, switch-block and twist edges.
//! Nodes carry structured [`NodeName`]s rather than grid coordinates; an
//! edge stores the tile offset a signal undergoes, and coordinates are
//! resolved only when the graph is instantiated over a device grid.

#![warn(missing_docs)]

pub mod builder;
pub mod graph;
pub mod node;
pub mod pattern;

pub use builder::GraphBuilder;
pub use graph::{Edge, RoutingGraph};
pub use node::{NodeKind, NodeName, RoutingNode, WireNode};
