//! Shared foundational types used across the Strata architecture generator.
//!
//! This crate provides the synthesis error taxonomy, dense arena ids, the
//! wire/side/axis vocabulary shared by the graph, layout and export phases,
//! and the [`DelayRecord`] that carries per-switch timing between them.

#![warn(missing_docs)]

pub mod delay;
pub mod error;
pub mod ids;
pub mod wire;

pub use delay::DelayRecord;
pub use error::{SynthResult, SynthesisError};
pub use ids::{EdgeId, NodeId};
pub use wire::{Axis, Side, SwitchKind, WireClass, CB_SWITCH, DELAYLESS_SWITCH};
