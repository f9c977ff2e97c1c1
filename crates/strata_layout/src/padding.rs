//! Area balancing by unit-wire padding.
//!
//! Starting from a declared composition, the balancer adds one unit-length
//! horizontal wire per slot at a time until the horizontal metal no longer
//! fits the tile height, then does the same with minimal vertical wires
//! against the tile width. Every step rebuilds the routing graph and the
//! mux stack from scratch, since the added wires widen the switch blocks
//! and with them the tile.
//!
//! Growth also stops when the next step would push the largest routing mux
//! past the configured fan-in ceiling. That step is discarded and the
//! architecture is accepted as it stands, with some area left unbalanced.

use crate::log::{PaddingImport, PaddingLog};
use crate::mux::{mux_sizes, MuxSizes};
use crate::stack::{stack_muxes, Layout};
use crate::tile::{metal_dimensions, tile_dimensions, Dimensions};
use serde::{Deserialize, Serialize};
use strata_channel::Composition;
use strata_common::{Axis, SynthResult, SynthesisError};
use strata_config::{Cluster, SynthesisConfig, TechNode};
use strata_rrg::{GraphBuilder, RoutingGraph};
use tracing::{debug, info, warn};

/// State after one accepted balancing step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddingStep {
    /// Unit-length horizontal wires per slot.
    pub horizontal: u32,
    /// Minimal vertical wires per slot.
    pub vertical: u32,
    /// Active tile footprint.
    pub tile: Dimensions,
    /// Metal footprint.
    pub metal: Dimensions,
    /// Largest routing-mux fan-in.
    pub largest_mux: u32,
}

/// A composition together with everything derived from it.
#[derive(Debug, Clone)]
pub struct BalancedArchitecture {
    /// Final channel composition, unit wires included.
    pub composition: Composition,
    /// Routing graph of the final composition.
    pub graph: RoutingGraph,
    /// Mux sizes of the representative slot.
    pub sizes: MuxSizes,
    /// Mux stack of the final composition.
    pub layout: Layout,
    /// Active tile footprint.
    pub tile: Dimensions,
    /// Metal footprint.
    pub metal: Dimensions,
    /// Unit-length horizontal wires added per slot.
    pub added_horizontal: u32,
    /// Minimal vertical wires added per slot.
    pub added_vertical: u32,
    /// Accepted steps, the starting point first.
    pub history: Vec<PaddingStep>,
    /// Whether the fan-in ceiling ended growth early.
    pub fanin_limited: bool,
}

impl BalancedArchitecture {
    /// Renders the padding log of this architecture.
    pub fn padding_log(&self) -> String {
        PaddingLog::render(&self.composition, self.tile, self.metal, &self.sizes)
    }
}

struct Evaluation {
    composition: Composition,
    graph: RoutingGraph,
    sizes: MuxSizes,
    layout: Layout,
    tile: Dimensions,
    metal: Dimensions,
}

impl Evaluation {
    fn footprints(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::Horizontal => (self.metal.height, self.tile.height),
            Axis::Vertical => (self.metal.width, self.tile.width),
        }
    }
}

/// Drives graph construction and layout to a balanced composition.
pub struct Balancer<'a> {
    config: &'a SynthesisConfig,
    cluster: Cluster,
    tech: TechNode,
}

impl<'a> Balancer<'a> {
    /// Creates a balancer for one configuration.
    pub fn new(config: &'a SynthesisConfig) -> SynthResult<Self> {
        Ok(Self {
            config,
            cluster: Cluster::from_config(config),
            tech: config.technology()?,
        })
    }

    /// The cluster being balanced.
    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    /// The process node in use.
    pub fn tech(&self) -> &TechNode {
        &self.tech
    }

    /// Balances a composition, importing the padding log named in the
    /// configuration instead of iterating when one is given.
    pub fn run(&self, composition: &Composition) -> SynthResult<BalancedArchitecture> {
        match &self.config.padding.import_log {
            Some(path) => self.import(composition, PaddingImport::from_file(path)?),
            None => self.balance(composition),
        }
    }

    /// Builds the graph and layout of a composition without padding it.
    pub fn evaluate(&self, composition: &Composition) -> SynthResult<BalancedArchitecture> {
        let eval = self.evaluation(composition.clone())?;
        let step = self.step(&eval);
        Ok(self.finish(eval, (0, 0), vec![step], false))
    }

    /// Iterates until metal meets the active area in both directions.
    pub fn balance(&self, composition: &Composition) -> SynthResult<BalancedArchitecture> {
        let start = self.evaluation(self.with_unit_entries(composition, 0, 0))?;
        let base = self.unit_counts(&start.composition);
        let mut history = vec![self.step(&start)];

        let (eval, h_limited) = self.grow(Axis::Horizontal, start, &mut history)?;
        let (eval, v_limited) = self.grow(Axis::Vertical, eval, &mut history)?;

        let counts = self.unit_counts(&eval.composition);
        let added = (counts.0 - base.0, counts.1 - base.1);
        info!(
            horizontal = added.0,
            vertical = added.1,
            steps = history.len() - 1,
            "balanced channel area"
        );
        Ok(self.finish(eval, added, history, h_limited || v_limited))
    }

    /// Applies unit-wire counts from a reference run in a single rebuild.
    pub fn import(
        &self,
        composition: &Composition,
        import: PaddingImport,
    ) -> SynthResult<BalancedArchitecture> {
        let padded = self.with_unit_entries(composition, import.horizontal, import.vertical);
        let eval = self.evaluation(padded)?;
        info!(
            horizontal = import.horizontal,
            vertical = import.vertical,
            "imported padding"
        );
        let step = self.step(&eval);
        Ok(self.finish(
            eval,
            (import.horizontal, import.vertical),
            vec![step],
            false,
        ))
    }

    fn unit_length(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Horizontal => 1,
            Axis::Vertical => self.cluster.min_vertical_length,
        }
    }

    fn unit_counts(&self, composition: &Composition) -> (u32, u32) {
        (
            composition.horizontal.count(self.unit_length(Axis::Horizontal)),
            composition.vertical.count(self.unit_length(Axis::Vertical)),
        )
    }

    fn with_unit_entries(&self, composition: &Composition, h: u32, v: u32) -> Composition {
        let mut out = composition.clone();
        out.horizontal.add(self.unit_length(Axis::Horizontal), h);
        out.vertical.add(self.unit_length(Axis::Vertical), v);
        out
    }

    fn evaluation(&self, composition: Composition) -> SynthResult<Evaluation> {
        let graph = GraphBuilder::new(&self.cluster, &self.config.pattern, &composition).build()?;
        let sizes = mux_sizes(&graph, &self.cluster);
        let layout = stack_muxes(&sizes, &self.cluster, &self.config.drivers)?;
        let tile = tile_dimensions(&self.cluster, &self.tech, &layout);
        let metal = metal_dimensions(&composition, &self.cluster, &self.tech);
        Ok(Evaluation {
            composition,
            graph,
            sizes,
            layout,
            tile,
            metal,
        })
    }

    fn step(&self, eval: &Evaluation) -> PaddingStep {
        let (horizontal, vertical) = self.unit_counts(&eval.composition);
        PaddingStep {
            horizontal,
            vertical,
            tile: eval.tile,
            metal: eval.metal,
            largest_mux: eval.sizes.largest(),
        }
    }

    /// Adds unit wires along one axis while its metal still fits.
    ///
    /// Returns the last accepted state and whether the fan-in ceiling
    /// ended growth.
    fn grow(
        &self,
        axis: Axis,
        mut current: Evaluation,
        history: &mut Vec<PaddingStep>,
    ) -> SynthResult<(Evaluation, bool)> {
        let length = self.unit_length(axis);
        let ceiling = self.config.padding.max_mux_fanin;
        let mut steps = 0;
        loop {
            let (metal, tile) = current.footprints(axis);
            if metal > tile {
                return Ok((current, false));
            }
            if steps == self.config.padding.max_iterations {
                return Err(SynthesisError::layout(format!(
                    "{}{length} padding did not balance within {steps} steps",
                    axis.letter()
                )));
            }
            steps += 1;

            let mut composition = current.composition.clone();
            composition.channel_mut(axis).add(length, 1);
            let next = self.evaluation(composition)?;

            let before = current.sizes.largest();
            let after = next.sizes.largest();
            if let Some(limit) = ceiling {
                if after > limit && after > before {
                    warn!(
                        wire = %format!("{}{length}", axis.letter()),
                        fanin = after,
                        limit,
                        "mux fan-in ceiling reached, padding stopped before area balanced"
                    );
                    return Ok((current, true));
                }
            }

            let step = self.step(&next);
            debug!(
                axis = %axis.letter(),
                horizontal = step.horizontal,
                vertical = step.vertical,
                tile_w = step.tile.width,
                tile_h = step.tile.height,
                metal_w = step.metal.width,
                metal_h = step.metal.height,
                "padding step"
            );
            history.push(step);
            current = next;
        }
    }

    fn finish(
        &self,
        eval: Evaluation,
        added: (u32, u32),
        history: Vec<PaddingStep>,
        fanin_limited: bool,
    ) -> BalancedArchitecture {
        let mut composition = eval.composition;
        for axis in [Axis::Horizontal, Axis::Vertical] {
            let length = self.unit_length(axis);
            let channel = composition.channel_mut(axis);
            if channel.contains(length) && channel.count(length) == 0 {
                channel.remove(length);
            }
        }
        BalancedArchitecture {
            composition,
            graph: eval.graph,
            sizes: eval.sizes,
            layout: eval.layout,
            tile: eval.tile,
            metal: eval.metal,
            added_horizontal: added.0,
            added_vertical: added.1,
            history,
            fanin_limited,
        }
    }
}
