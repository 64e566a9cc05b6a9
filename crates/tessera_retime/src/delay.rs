//! The per-node delay model.

use tessera_common::{TesseraError, TesseraResult};
use tessera_fabric::{LayoutGrid, Node, NodeKind, SwitchBoxIo, TimingCostTable};

/// Looks up the combinational delay of physical nodes.
///
/// The cost of a node depends on its kind and, for ports and switch-box
/// outputs, on the kind of tile it sits on. Memory ports carry the full
/// access cost because memory outputs are registered inside the tile;
/// switch-box inputs are free (the cost sits on the output side).
#[derive(Debug, Clone, Copy)]
pub struct DelayModel<'a> {
    layout: &'a LayoutGrid,
    costs: &'a TimingCostTable,
}

impl<'a> DelayModel<'a> {
    /// Creates a delay model over a layout and a cost table.
    pub fn new(layout: &'a LayoutGrid, costs: &'a TimingCostTable) -> Self {
        Self { layout, costs }
    }

    /// Returns the delay contributed by `node`.
    ///
    /// Fails with an invariant violation naming the node when it sits on a
    /// tile kind the model cannot classify (or outside the board).
    pub fn delay_of(&self, node: &Node) -> TesseraResult<u64> {
        match node.kind {
            NodeKind::Port => match self.blk_type(node)? {
                'p' => Ok(self.costs.clb_op),
                // Memory outputs come out of an internal register.
                'm' => Ok(self.costs.mem),
                'i' | 'I' => Ok(0),
                other => Err(unclassified(node, other)),
            },
            NodeKind::Register => Ok(self.costs.reg),
            NodeKind::SwitchBox(SwitchBoxIo::SbIn) => Ok(0),
            NodeKind::SwitchBox(SwitchBoxIo::SbOut) => match self.blk_type(node)? {
                'p' => Ok(self.costs.clb_sb),
                'm' => Ok(self.costs.mem_sb),
                'i' => Ok(0),
                other => Err(unclassified(node, other)),
            },
            NodeKind::Generic => Ok(self.costs.rmux),
        }
    }

    fn blk_type(&self, node: &Node) -> TesseraResult<char> {
        self.layout.get_blk_type(node.x, node.y).ok_or_else(|| {
            TesseraError::invariant(format!(
                "node {} at ({}, {}) lies outside the board",
                node.name, node.x, node.y
            ))
        })
    }
}

fn unclassified(node: &Node, blk: char) -> TesseraError {
    TesseraError::invariant(format!(
        "no delay rule for node {} on a '{blk}' tile",
        node.name
    ))
}
