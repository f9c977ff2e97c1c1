//! Column stacking of the routing multiplexers.
//!
//! Muxes are placed in a fixed order (crossbar first, then connection
//! block, then switch block, each by descending size) into columns no
//! taller than one BLE. Columns grow leftwards from the logic, so pin
//! x coordinates are negative fin-pitch offsets from the logic edge.

use crate::mux::{mux_dimensions, MuxId, MuxSizes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_common::{Axis, SynthResult, SynthesisError};
use strata_config::{Cluster, DriverConfig, DriverStrength};
use strata_rrg::NodeName;
use tracing::debug;

/// Fixed mux width in fin pitches, before one fin per row.
const MUX_BASE_WIDTH: u32 = 21;

/// One placed multiplexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuxPlacement {
    /// Which mux this is.
    pub id: MuxId,
    /// Input count.
    pub inputs: u32,
    /// Rows of the pass-transistor array.
    pub rows: u32,
    /// Columns of the pass-transistor array.
    pub cols: u32,
    /// Width in fin pitches.
    pub width: u32,
    /// Height in gate pitches, driver included.
    pub height: u32,
    /// Index of the stack column.
    pub column: usize,
    /// Input pin `(x, y)` in (fin, gate) pitches.
    pub input_pin: (f64, f64),
    /// Output pin `(x, y)` in (fin, gate) pitches.
    pub output_pin: (f64, f64),
}

/// The stacked multiplexers of one tile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    placements: Vec<MuxPlacement>,
    column_widths: Vec<u32>,
}

impl Layout {
    /// Placements in stacking order.
    pub fn placements(&self) -> &[MuxPlacement] {
        &self.placements
    }

    /// Looks up a placement.
    pub fn get(&self, id: &MuxId) -> Option<&MuxPlacement> {
        self.placements.iter().find(|p| &p.id == id)
    }

    /// Looks up the mux driving a routing node.
    pub fn for_node(&self, name: &NodeName) -> Option<&MuxPlacement> {
        self.get(&MuxId::Node(*name))
    }

    /// Total width of the stack in fin pitches.
    pub fn stack_width(&self) -> u32 {
        self.column_widths.iter().sum()
    }

    /// Number of stack columns.
    pub fn column_count(&self) -> usize {
        self.column_widths.len()
    }
}

/// Height in gate pitches of a two-stage driver beside a mux `width` fins wide.
fn driver_height(driver: DriverStrength, width: u32) -> u32 {
    (2 * driver.d0 + 1 + 2 * driver.d1 + 1 + 1).div_ceil(width)
}

fn driver_of(id: &MuxId, drivers: &DriverConfig) -> Option<DriverStrength> {
    match id {
        MuxId::Crossbar(_) => None,
        MuxId::Node(NodeName::ClusterInput { .. }) => Some(drivers.local),
        MuxId::Node(NodeName::Wire(w)) => Some(match w.axis() {
            Axis::Horizontal => drivers.horizontal(w.length),
            Axis::Vertical => drivers.vertical(w.length),
        }),
        MuxId::Node(_) => Some(DriverStrength::default()),
    }
}

/// Sorts by descending size, ties by name.
fn ordered(muxes: &BTreeMap<NodeName, u32>) -> Vec<(MuxId, u32)> {
    let mut out: Vec<(MuxId, u32)> = muxes.iter().map(|(n, s)| (MuxId::Node(*n), *s)).collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

/// Stacks every mux of the representative slot.
///
/// Fails if a mux alone is taller than the BLE height.
pub fn stack_muxes(sizes: &MuxSizes, cluster: &Cluster, drivers: &DriverConfig) -> SynthResult<Layout> {
    let mut order: Vec<(MuxId, u32)> = (0..cluster.k)
        .map(|i| (MuxId::Crossbar(i), cluster.crossbar_mux_size))
        .collect();
    order.extend(ordered(&sizes.connection_block));
    order.extend(ordered(&sizes.switch_block));

    let max_height = cluster.lut_height;
    let mut layout = Layout::default();
    let mut column_height = 0u32;
    let mut column_width = 0u32;
    let mut cur_x = 0.0f64;
    let mut cur_y = 0.0f64;

    for (id, inputs) in order {
        let (rows, cols) = mux_dimensions(inputs, max_height)?;
        let width = MUX_BASE_WIDTH + rows;
        let driver = driver_of(&id, drivers).map_or(0, |d| driver_height(d, width));
        let height = 2 * rows.max(cols) + driver;
        if height > max_height {
            return Err(SynthesisError::layout(format!(
                "mux {id} with {inputs} inputs is {height} gate pitches tall, \
                 exceeding the cluster height of {max_height}"
            )));
        }
        if column_height + height > max_height {
            cur_x -= f64::from(column_width);
            layout.column_widths.push(column_width);
            column_height = 0;
            column_width = 0;
            cur_y = 0.0;
        }
        layout.placements.push(MuxPlacement {
            id,
            inputs,
            rows,
            cols,
            width,
            height,
            column: layout.column_widths.len(),
            input_pin: (cur_x - 0.5 * f64::from(width), cur_y),
            output_pin: (cur_x, cur_y + 0.5 * f64::from(height)),
        });
        cur_y += f64::from(height);
        column_height += height;
        column_width = column_width.max(width);
    }
    if column_width > 0 {
        layout.column_widths.push(column_width);
    }
    debug!(
        muxes = layout.placements.len(),
        columns = layout.column_count(),
        width = layout.stack_width(),
        "stacked multiplexers"
    );
    Ok(layout)
}
