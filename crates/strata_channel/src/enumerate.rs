//! Composition enumerator.
//!
//! Searches every horizontal count vector whose tracks fit the cluster
//! height, then, for each of them, every vertical count vector whose tracks
//! fit the active tile width. The width depends on the horizontal wires
//! already placed, since each of them adds a switch-block mux. Lengths
//! are powers of two from 2 up to the node's span limit; unit-length wires
//! are not enumerated, they fill the remaining metal during balancing.

use crate::composition::{Channel, Composition};
use serde::{Deserialize, Serialize};
use strata_common::Axis;
use strata_config::{Cluster, TechNode};
use tracing::{debug, warn};

/// Inputs of the mux assumed when predicting tile width growth.
const PROTOTYPE_MUX_INPUTS: u32 = 16;

/// Crossbar and connection-block mux columns assumed in the base width.
const LOCAL_MUX_COLUMNS: f64 = 3.0;

/// Widest switch-block mux tolerated by a candidate pair.
const MAX_MUX_WIDTH: i64 = 36;

/// One accepted count vector plus the unit-length wires that fill it up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCandidate {
    /// Counts of the enumerated lengths (zero counts included).
    pub channel: Channel,
    /// Unit-length wires balancing the remaining metal; may be negative
    /// for vertical channels whose muxes outgrow the tracks they add.
    pub unit_padding: i64,
}

/// A feasible (horizontal, vertical) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibleComposition {
    /// Enumerated wires of both directions.
    pub composition: Composition,
    /// Unit-length horizontal wires predicted by the padding estimate.
    pub horizontal_padding: u32,
    /// Unit-length vertical wires predicted by the padding estimate.
    pub vertical_padding: u32,
}

/// Enumerates feasible channel compositions for one cluster and node.
#[derive(Debug, Clone)]
pub struct Enumerator {
    cluster: Cluster,
    tech: TechNode,
}

impl Enumerator {
    /// Creates an enumerator.
    pub fn new(cluster: Cluster, tech: TechNode) -> Self {
        Self { cluster, tech }
    }

    fn mux_width(&self) -> f64 {
        21.0 + f64::from(PROTOTYPE_MUX_INPUTS).sqrt().ceil()
    }

    fn lut_scale(&self) -> f64 {
        f64::from(self.cluster.lut_scale())
    }

    /// Height available to horizontal tracks, in nanometres.
    fn cluster_height_nm(&self) -> f64 {
        f64::from(self.cluster.lut_height) * self.tech.gate_pitch
    }

    /// Active width with no vertical wires, in fin pitches.
    pub fn base_width(&self) -> f64 {
        f64::from(self.cluster.lut_width) + LOCAL_MUX_COLUMNS * self.mux_width()
    }

    /// Active width once `h_wires` horizontal wires have their muxes placed.
    pub fn active_width(&self, h_wires: i64) -> f64 {
        self.base_width() + 2.0 * h_wires as f64 / self.lut_scale() * self.mux_width()
    }

    /// Maximum horizontal wires of `length` per LUT.
    pub fn max_horizontal_count(&self, length: u32) -> u32 {
        let per_wire = 2.0 * f64::from(length) * self.tech.my_pitch;
        (self.cluster_height_nm() / per_wire).floor().max(0.0) as u32
    }

    /// Maximum vertical wires of `length` per LUT for an active width in fin pitches.
    ///
    /// Returns 0 when a wire's own mux widens the tile more than its tracks
    /// consume, since no finite count then balances.
    pub fn max_vertical_count(&self, length: u32, active_width: f64) -> u32 {
        let denominator = 2.0 * f64::from(self.cluster.n) * f64::from(length) * self.tech.my_pitch
            - self.mux_width() / self.lut_scale() * self.tech.fin_pitch;
        if denominator <= 0.0 {
            return 0;
        }
        (active_width * self.tech.fin_pitch / denominator).floor().max(0.0) as u32
    }

    /// Enumerates feasible horizontal channels.
    pub fn horizontal(&self) -> Vec<ChannelCandidate> {
        let lengths = spans(self.tech.max_h_span);
        let options = self.options(Axis::Horizontal, &lengths, |l| self.max_horizontal_count(l));
        let height = self.cluster_height_nm();

        cartesian(&options)
            .into_iter()
            .filter_map(|counts| {
                let channel = channel_from(Axis::Horizontal, &options, &counts);
                let tracks = channel.track_count() as f64 * self.tech.my_pitch;
                if tracks > height {
                    return None;
                }
                let pad = ((height - tracks) / (2.0 * self.tech.my_pitch)).floor() as i64;
                Some(ChannelCandidate {
                    channel,
                    unit_padding: pad,
                })
            })
            .collect()
    }

    /// Enumerates feasible vertical channels given `h_wires` horizontal wires
    /// (padding included).
    pub fn vertical(&self, h_wires: i64) -> Vec<ChannelCandidate> {
        let width = self.active_width(h_wires);
        let lengths = spans(self.tech.max_v_span);
        let options = self.options(Axis::Vertical, &lengths, |l| self.max_vertical_count(l, width));
        let n = f64::from(self.cluster.n);
        let mux_share = self.mux_width() / self.lut_scale();
        let fp = self.tech.fin_pitch;
        let myp = self.tech.my_pitch;

        cartesian(&options)
            .into_iter()
            .filter_map(|counts| {
                let channel = channel_from(Axis::Vertical, &options, &counts);
                let tracks = n * channel.track_count() as f64 * myp;
                let available = (width + f64::from(channel.wire_count()) * mux_share) * fp;
                if tracks > available {
                    return None;
                }
                let pad = ((available - tracks) / (myp - mux_share * fp)).floor() as i64;
                let v_wires = i64::from(channel.wire_count()) + pad;
                let mux_width = (2 * h_wires + v_wires).max(2 * v_wires + h_wires) + 1;
                if mux_width > MAX_MUX_WIDTH {
                    return None;
                }
                Some(ChannelCandidate {
                    channel,
                    unit_padding: pad,
                })
            })
            .collect()
    }

    /// Enumerates every feasible (horizontal, vertical) pair.
    pub fn enumerate(&self) -> Vec<FeasibleComposition> {
        let mut result = Vec::new();
        for h in self.horizontal() {
            let h_wires = i64::from(h.channel.wire_count()) + h.unit_padding;
            let verticals = self.vertical(h_wires);
            debug!(
                horizontal = ?h.channel,
                vertical_candidates = verticals.len(),
                "enumerated vertical channels"
            );
            for v in verticals {
                result.push(FeasibleComposition {
                    composition: Composition {
                        horizontal: h.channel.clone(),
                        vertical: v.channel,
                    },
                    horizontal_padding: h.unit_padding.max(0) as u32,
                    vertical_padding: v.unit_padding.max(0) as u32,
                });
            }
        }
        result
    }

    /// Builds the count options per length, dropping lengths with no legal count.
    fn options(
        &self,
        axis: Axis,
        lengths: &[u32],
        max_count: impl Fn(u32) -> u32,
    ) -> Vec<(u32, Vec<u32>)> {
        lengths
            .iter()
            .filter_map(|&length| {
                let max = max_count(length);
                if max == 0 {
                    warn!(
                        "{}{length} cannot be placed in a {}-LUT cluster of {}; excluded",
                        axis.letter(),
                        self.cluster.k,
                        self.cluster.n
                    );
                    return None;
                }
                Some((length, count_options(max)))
            })
            .collect()
    }
}

/// Powers of two from 2 up to `max_span`.
fn spans(max_span: u32) -> Vec<u32> {
    (1..32)
        .map(|i| 1u32 << i)
        .take_while(|&l| l <= max_span)
        .collect()
}

/// `{0} ∪ {1, 2, 4, …}` up to the largest power of two not above `max`.
fn count_options(max: u32) -> Vec<u32> {
    std::iter::once(0)
        .chain((0..32).map(|i| 1u32 << i).take_while(|&c| c <= max))
        .collect()
}

fn channel_from(axis: Axis, options: &[(u32, Vec<u32>)], counts: &[u32]) -> Channel {
    let mut channel = Channel::new(axis);
    for ((length, _), &count) in options.iter().zip(counts) {
        channel.set(*length, count);
    }
    channel
}

/// Cartesian product of the count options, first length varying slowest.
fn cartesian(options: &[(u32, Vec<u32>)]) -> Vec<Vec<u32>> {
    let mut product: Vec<Vec<u32>> = vec![Vec::new()];
    for (_, counts) in options {
        product = product
            .into_iter()
            .flat_map(|prefix| {
                counts.iter().map(move |&c| {
                    let mut next = prefix.clone();
                    next.push(c);
                    next
                })
            })
            .collect();
    }
    product
}
