//! Nets and their pin terminals.

use crate::ids::{NetId, NodeId, PinId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A netlist keyed by net id. BTreeMap iteration gives passes a
/// deterministic net order.
pub type Netlist = BTreeMap<NetId, Net>;

/// A terminal of a net.
///
/// `name` is the identifier of the placed operator this pin belongs to;
/// `port` is the port on that operator. A pin whose operator name begins
/// with `i` or `I` denotes a primary input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    /// The unique ID of this pin.
    pub id: PinId,
    /// Tile x coordinate.
    pub x: u32,
    /// Tile y coordinate.
    pub y: u32,
    /// The operator this pin belongs to.
    pub name: String,
    /// The port name on that operator.
    pub port: String,
    /// The physical node realizing this pin.
    pub node: NodeId,
}

impl Pin {
    /// Returns `true` if this pin belongs to a primary input.
    pub fn is_primary_input(&self) -> bool {
        matches!(self.name.chars().next(), Some('i') | Some('I'))
    }
}

/// A single-driver, multi-receiver connection.
///
/// Pin 0 is the driver; every following pin is a receiver. A well-formed
/// net has at least two pins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    /// The unique ID of this net.
    pub id: NetId,
    /// The pins of this net, driver first.
    pub pins: Vec<Pin>,
}

impl Net {
    /// Returns the driver pin of this net.
    pub fn driver(&self) -> &Pin {
        &self.pins[0]
    }

    /// Returns the receiver pins of this net, in order.
    pub fn receivers(&self) -> &[Pin] {
        &self.pins[1..]
    }
}
