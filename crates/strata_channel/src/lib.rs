//! Channel compositions and their enumeration.
//!
//! A [`Composition`] lists, per direction, how many wires of each length
//! every cluster slot drives. Compositions are read from `.wire` files or
//! produced by the [`Enumerator`], which searches all count vectors whose
//! metal footprint fits the fixed cluster geometry.

#![warn(missing_docs)]

pub mod composition;
pub mod enumerate;

pub use composition::{Channel, Composition};
pub use enumerate::{ChannelCandidate, Enumerator, FeasibleComposition};
