//! Opaque ID newtypes for routing graph entities.
//!
//! Each ID is a dense `u32` index into an arena owned by the graph that
//! issued it. IDs from different graphs must not be mixed.

use serde::{Deserialize, Serialize};

/// Declares a `u32` newtype ID with `from_raw`/`as_raw` and `Display`.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns the index as a `usize` for arena lookups.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Dense ID of a logical routing node.
    NodeId
);

define_id!(
    /// Dense ID of a logical routing edge.
    EdgeId
);
