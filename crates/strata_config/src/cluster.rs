//! Quantities derived from the logic-cluster shape.

use crate::types::SynthesisConfig;
use serde::{Deserialize, Serialize};

/// Per-LUT height in gate pitches for a 4-input LUT (two 6-track rows).
const LUT4_HEIGHT: u32 = 12;

/// Logic width of a cluster column in fin pitches.
const LUT_WIDTH: u32 = 160;

/// Total LUT4-equivalents of the reference K=6, N=8 cluster.
const REFERENCE_LUT4S: u32 = 32;

/// Cluster size at which vertical tap spacing is one tile per LUT.
const TAP_OPERATING_POINT: u32 = 8;

/// Fixed shape of one logic cluster and everything computed from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// LUT size.
    pub k: u32,
    /// BLEs per cluster.
    pub n: u32,
    /// Cluster input pins.
    pub inputs: u32,
    /// Outputs per BLE.
    pub outputs: u32,
    /// Inputs of each crossbar multiplexer.
    pub crossbar_mux_size: u32,
    /// Height of one BLE in gate pitches.
    pub lut_height: u32,
    /// Logic width in fin pitches.
    pub lut_width: u32,
    /// Number of vertical taps driven per wire.
    pub tap_count: u32,
    /// Distance in tiles between consecutive taps.
    pub tap_spacing: u32,
    /// Pads per I/O tile.
    pub io_capacity: u32,
    /// Shortest vertical wire, used for padding and twists.
    pub min_vertical_length: u32,
}

impl Cluster {
    /// Derives the cluster shape from a configuration.
    pub fn from_config(config: &SynthesisConfig) -> Self {
        let k = config.architecture.k;
        let n = config.architecture.n;
        let inputs = cluster_inputs(k, n);
        let crossbar = (config.architecture.density * f64::from(n + inputs)).ceil() as u32;
        let scale = lut_scale(k);
        Self {
            k,
            n,
            inputs,
            outputs: 1,
            crossbar_mux_size: crossbar.max(1),
            lut_height: scale * LUT4_HEIGHT,
            lut_width: LUT_WIDTH,
            tap_count: (TAP_OPERATING_POINT / n).max(1),
            tap_spacing: 1,
            io_capacity: if config.grid.top_bottom_io { 8 } else { n },
            min_vertical_length: (REFERENCE_LUT4S / (n * scale)).max(1),
        }
    }

    /// Inputs per BLE slot in the connection-block equivalence group.
    pub fn inputs_per_slot(&self) -> u32 {
        self.inputs / self.n
    }

    /// LUT4-equivalents per K-input LUT.
    pub fn lut_scale(&self) -> u32 {
        lut_scale(self.k)
    }

    /// Rescales a declared vertical length to this cluster's height.
    ///
    /// Composition files state vertical lengths for the reference cluster;
    /// taller clusters cover the same distance in fewer tiles.
    pub fn scale_vertical_length(&self, length: u32) -> u32 {
        let lut4s = self.n * self.lut_scale();
        let scaled = (u64::from(length) * u64::from(REFERENCE_LUT4S)).div_ceil(u64::from(lut4s));
        (scaled as u32).max(1)
    }

    /// Slot whose muxes represent every slot during sizing and measurement.
    pub fn representative_slot(&self) -> u32 {
        if self.n > 1 {
            1
        } else {
            0
        }
    }

    /// Offset in tiles from a vertical wire's start to the CB driven at `tap`.
    pub fn tap_offset(&self, length: u32, tap: u32) -> i32 {
        length as i32 - (self.tap_count * self.tap_spacing) as i32 + 1 + (tap * self.tap_spacing) as i32
    }
}

/// Cluster input count: `ceil(K·N^0.8 / N)·N`.
pub fn cluster_inputs(k: u32, n: u32) -> u32 {
    let per_slot = (f64::from(k) * f64::from(n).powf(0.8) / f64::from(n)).ceil() as u32;
    per_slot * n
}

fn lut_scale(k: u32) -> u32 {
    1 << k.saturating_sub(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(k: u32, n: u32) -> Cluster {
        let mut config = SynthesisConfig::default();
        config.architecture.k = k;
        config.architecture.n = n;
        Cluster::from_config(&config)
    }

    #[test]
    fn k6n8_shape() {
        let c = cluster(6, 8);
        // 6 * 8^0.8 / 8 = 3.96 -> 4 per slot
        assert_eq!(c.inputs, 32);
        assert_eq!(c.inputs_per_slot(), 4);
        assert_eq!(c.crossbar_mux_size, 20);
        assert_eq!(c.lut_height, 48);
        assert_eq!(c.tap_count, 1);
        assert_eq!(c.min_vertical_length, 1);
        assert_eq!(c.io_capacity, 8);
    }

    #[test]
    fn k4n2_shape() {
        let c = cluster(4, 2);
        // 4 * 2^0.8 / 2 = 3.48 -> 4 per slot
        assert_eq!(c.inputs, 8);
        assert_eq!(c.lut_height, 12);
        assert_eq!(c.tap_count, 4);
        assert_eq!(c.min_vertical_length, 16);
        assert_eq!(c.representative_slot(), 1);
    }

    #[test]
    fn vertical_scaling() {
        let c = cluster(6, 8);
        assert_eq!(c.scale_vertical_length(4), 4);
        let c = cluster(6, 16);
        assert_eq!(c.scale_vertical_length(4), 2);
        assert_eq!(c.scale_vertical_length(1), 1);
        let c = cluster(4, 2);
        assert_eq!(c.scale_vertical_length(2), 32);
    }

    #[test]
    fn tap_offsets_cover_wire_end() {
        let c = cluster(4, 2);
        // four taps on a length-8 wire land on tiles 5..=8
        let offsets: Vec<i32> = (0..c.tap_count).map(|t| c.tap_offset(8, t)).collect();
        assert_eq!(offsets, vec![5, 6, 7, 8]);
    }

    #[test]
    fn single_slot_cluster_uses_slot_zero() {
        assert_eq!(cluster(6, 1).representative_slot(), 0);
    }
}
