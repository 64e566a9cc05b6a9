//! Opaque ID newtypes for physical netlist entities.
//!
//! [`NodeId`], [`PinId`], and [`NetId`] are thin `u32` wrappers used as
//! arena indices and map keys. They are `Copy`, `Ord`, `Hash`, and
//! `Serialize`/`Deserialize`.

use serde::{Deserialize, Serialize};

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
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a physical routing node.
    NodeId
);

define_id!(
    /// Opaque, copyable ID for a pin (a net terminal).
    PinId
);

define_id!(
    /// Opaque, copyable ID for a net.
    NetId
);
