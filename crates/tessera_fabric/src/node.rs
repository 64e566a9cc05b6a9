//! Physical routing nodes and the arena that owns them.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};

/// Which side of a switch box a node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchBoxIo {
    /// The input side; the signal enters the switch box here.
    SbIn,
    /// The output side; the signal leaves the switch box here.
    SbOut,
}

/// The kind of a physical routing resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// A tile port, connecting the routing fabric to an operator.
    Port,
    /// A pipeline register; each one adds one wave to signals through it.
    Register,
    /// A switch box terminal, on the given side.
    SwitchBox(SwitchBoxIo),
    /// Any other routing resource, such as a routing mux.
    Generic,
}

/// A physical routing resource at a fixed tile position.
///
/// Nodes are owned by a [`NodeArena`]; pins and routed segments refer to
/// them by [`NodeId`]. Register nodes created during retiming come from the
/// same arena, so node ids stay unique across the whole design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// The unique ID of this node.
    pub id: NodeId,
    /// Human-readable node name (e.g., "sb_out_3_2", "reg_1_0_17").
    pub name: String,
    /// Tile x coordinate.
    pub x: u32,
    /// Tile y coordinate.
    pub y: u32,
    /// The kind of routing resource this node is.
    pub kind: NodeKind,
}

impl Node {
    /// Returns `true` if this node is a pipeline register.
    pub fn is_register(&self) -> bool {
        self.kind == NodeKind::Register
    }

    /// Returns `true` if this node is the input side of a switch box.
    pub fn is_sb_in(&self) -> bool {
        self.kind == NodeKind::SwitchBox(SwitchBoxIo::SbIn)
    }
}

/// Append-only storage for all physical nodes of a design.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new node and returns its ID.
    pub fn alloc(&mut self, name: impl Into<String>, x: u32, y: u32, kind: NodeKind) -> NodeId {
        let id = NodeId::from_raw(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            name: name.into(),
            x,
            y,
            kind,
        });
        id
    }

    /// Returns the node with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this arena.
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.as_raw() as usize]
    }

    /// Returns the number of nodes allocated so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no nodes have been allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all nodes in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }
}
