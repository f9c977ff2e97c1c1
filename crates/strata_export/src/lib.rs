//! Export of a synthesized architecture for the place-and-route tool.
//!
//! Two artifacts are produced from the same [`SwitchTable`] and
//! [`SegmentTable`]: the routing-resource graph, which instantiates the
//! routing graph of one tile over the whole [`Grid`], and the
//! architecture description carrying the grid rules, switch delays and
//! logic block timing.

#![warn(missing_docs)]

pub mod arch;
pub mod grid;
pub mod rr_graph;
pub mod tables;

pub use arch::{read_switch_delays, resize_layout, ArchitectureWriter};
pub use grid::{BlockType, Grid};
pub use rr_graph::{RrGraphDocument, RrGraphExporter};
pub use tables::{format_g, segment_span, SegmentTable, SwitchEntry, SwitchTable};
