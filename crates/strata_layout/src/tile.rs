//! Tile and metal footprints in nanometres.

use crate::stack::Layout;
use serde::{Deserialize, Serialize};
use strata_channel::Composition;
use strata_common::Axis;
use strata_config::{Cluster, TechNode};

/// Smallest grid side, I/O ring included.
pub const MIN_GRID_SIDE: u32 = 7;

/// Width and height in nanometres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl Dimensions {
    /// Area in square nanometres.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Active tile dimensions: logic plus the mux stack wide, one cluster tall.
pub fn tile_dimensions(cluster: &Cluster, tech: &TechNode, layout: &Layout) -> Dimensions {
    Dimensions {
        width: f64::from(cluster.lut_width + layout.stack_width()) * tech.fin_pitch,
        height: f64::from(cluster.lut_height * cluster.n) * tech.gate_pitch,
    }
}

/// Metal needed to route every declared wire over one tile.
///
/// Each wire of length `L` driven from each of the `N` slots occupies
/// `2·L` tracks: one per tile it spans, in both directions.
pub fn metal_dimensions(composition: &Composition, cluster: &Cluster, tech: &TechNode) -> Dimensions {
    let tracks = |axis| {
        let tracks = composition.channel(axis).track_count();
        tracks.saturating_mul(u64::from(cluster.n)) as f64
    };
    Dimensions {
        width: tracks(Axis::Vertical) * tech.my_pitch,
        height: tracks(Axis::Horizontal) * tech.my_pitch,
    }
}

/// Reshapes a `width × height` grid so the die becomes physically square.
///
/// The tile count is kept (rounded up) and neither side drops below
/// [`MIN_GRID_SIDE`]. A tile is as wide and as tall as the larger of its
/// active and metal footprints.
pub fn square_grid(width: u32, height: u32, tile: Dimensions, metal: Dimensions) -> (u32, u32) {
    let tile_w = tile.width.max(metal.width);
    let tile_h = tile.height.max(metal.height);
    let multiplier = (tile_w / tile_h).sqrt();
    let total = width * height;

    let mut new_w = ((f64::from(width) / multiplier).ceil() as u32).max(MIN_GRID_SIDE);
    let mut new_h = total.div_ceil(new_w);
    if new_h < MIN_GRID_SIDE {
        new_h = MIN_GRID_SIDE;
        let tentative = total.div_ceil(new_h);
        if tentative >= MIN_GRID_SIDE {
            new_w = tentative;
        }
    }
    (new_w, new_h)
}
