//! Device grid: an I/O ring around an array of logic clusters.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strata_config::GridConfig;
use strata_layout::tile::MIN_GRID_SIDE;

/// Block type occupying one grid location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BlockType {
    /// No block.
    Empty,
    /// I/O pads.
    Io,
    /// A logic cluster.
    Clb,
}

impl BlockType {
    /// Returns the exported block type id.
    pub fn id(self) -> u32 {
        match self {
            Self::Empty => 0,
            Self::Io => 1,
            Self::Clb => 2,
        }
    }

    /// Returns the exported block type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Io => "io",
            Self::Clb => "clb",
        }
    }
}

/// A rectangular device grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    top_bottom_io: bool,
    cut_corners: bool,
    cells: BTreeMap<(i32, i32), BlockType>,
}

impl Grid {
    /// Lays out a `width × height` grid.
    ///
    /// The outermost ring holds I/O. Sides below the minimum are raised to it.
    pub fn generate(width: u32, height: u32, top_bottom_io: bool, cut_corners: bool) -> Self {
        let width = width.max(MIN_GRID_SIDE);
        let height = height.max(MIN_GRID_SIDE);
        let (w, h) = (width as i32, height as i32);
        let mut cells = BTreeMap::new();
        for x in 0..w {
            for y in 0..h {
                let on_ring = x < 1 || x > w - 2 || y < 1 || y > h - 2;
                cells.insert((x, y), if on_ring { BlockType::Io } else { BlockType::Clb });
            }
        }
        if cut_corners {
            for corner in [(0, 0), (0, h - 1), (w - 1, 0), (w - 1, h - 1)] {
                cells.insert(corner, BlockType::Empty);
            }
        }
        if top_bottom_io {
            for y in 0..h {
                cells.insert((0, y), BlockType::Empty);
                cells.insert((w - 1, y), BlockType::Empty);
            }
        }
        Self {
            width,
            height,
            top_bottom_io,
            cut_corners,
            cells,
        }
    }

    /// Lays out the grid described by the configuration.
    pub fn from_config(config: &GridConfig) -> Self {
        Self::generate(config.width, config.height, config.top_bottom_io, config.cut_corners)
    }

    /// Width in tiles.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in tiles.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether I/O sits only on the top and bottom rows.
    pub fn top_bottom_io(&self) -> bool {
        self.top_bottom_io
    }

    /// Whether the corner tiles are empty.
    pub fn cut_corners(&self) -> bool {
        self.cut_corners
    }

    /// Returns the block at a location, `None` off the grid.
    pub fn get(&self, x: i32, y: i32) -> Option<BlockType> {
        self.cells.get(&(x, y)).copied()
    }

    /// Iterates over all locations in `(x, y)` order.
    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32), BlockType)> + '_ {
        self.cells.iter().map(|(&c, &b)| (c, b))
    }

    /// Locations holding the given block type, in `(x, y)` order.
    pub fn locations(&self, block: BlockType) -> Vec<(i32, i32)> {
        self.iter()
            .filter(|&(_, b)| b == block)
            .map(|(c, _)| c)
            .collect()
    }

    /// Highest column index a channel may reach.
    pub fn max_x(&self) -> i32 {
        self.width as i32 - 2
    }

    /// Highest row index a channel may reach.
    pub fn max_y(&self) -> i32 {
        self.height as i32 - 2
    }

    /// Grid locations plus a margin of `h_margin` columns and `v_margin`
    /// rows outside the array, sorted.
    ///
    /// Wires starting in the margin still reach into the array; their
    /// portion outside it is trimmed at instantiation.
    pub fn extended(&self, h_margin: u32, v_margin: u32) -> Vec<(i32, i32)> {
        let (w, h) = (self.width as i32, self.height as i32);
        let (hm, vm) = (h_margin as i32, v_margin as i32);
        let mut coords: BTreeSet<(i32, i32)> = self.cells.keys().copied().collect();
        for y in 0..h {
            for x in -hm..0 {
                coords.insert((x, y));
            }
            for x in 1..hm {
                coords.insert((w - 1 + x, y));
            }
        }
        for x in 0..w {
            for y in -vm..0 {
                coords.insert((x, y));
            }
            for y in 1..vm {
                coords.insert((x, h - 1 + y));
            }
        }
        coords.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_ring_with_cut_corners() {
        let grid = Grid::generate(8, 9, false, true);
        assert_eq!(grid.get(0, 0), Some(BlockType::Empty));
        assert_eq!(grid.get(7, 8), Some(BlockType::Empty));
        assert_eq!(grid.get(0, 4), Some(BlockType::Io));
        assert_eq!(grid.get(4, 8), Some(BlockType::Io));
        assert_eq!(grid.get(3, 3), Some(BlockType::Clb));
        assert_eq!(grid.locations(BlockType::Clb).len(), 6 * 7);
        assert_eq!(grid.locations(BlockType::Io).len(), 2 * 6 + 2 * 7);
        assert_eq!(grid.get(8, 0), None);
    }

    #[test]
    fn top_bottom_io_clears_side_columns() {
        let grid = Grid::generate(7, 7, true, false);
        for y in 0..7 {
            assert_eq!(grid.get(0, y), Some(BlockType::Empty));
            assert_eq!(grid.get(6, y), Some(BlockType::Empty));
        }
        assert_eq!(grid.get(3, 0), Some(BlockType::Io));
        assert_eq!(grid.get(3, 6), Some(BlockType::Io));
    }

    #[test]
    fn small_grids_are_raised_to_minimum() {
        let grid = Grid::generate(3, 2, false, true);
        assert_eq!((grid.width(), grid.height()), (MIN_GRID_SIDE, MIN_GRID_SIDE));
        assert_eq!(grid.max_x(), MIN_GRID_SIDE as i32 - 2);
    }

    #[test]
    fn extended_margin() {
        let grid = Grid::generate(7, 7, false, true);
        let coords = grid.extended(4, 2);
        assert_eq!(coords.len(), 49 + (4 + 3) * 7 + (2 + 1) * 7);
        assert_eq!(coords.first(), Some(&(-4, 0)));
        assert!(coords.contains(&(9, 6)));
        assert!(!coords.contains(&(10, 0)));
        assert!(coords.contains(&(3, -2)));
        assert!(coords.contains(&(3, 7)));
        assert!(!coords.contains(&(-1, -1)));
        assert!(coords.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn block_ids() {
        assert_eq!(BlockType::Empty.id(), 0);
        assert_eq!(BlockType::Io.id(), 1);
        assert_eq!(BlockType::Clb.name(), "clb");
    }
}
