//! Board layout and timing cost description.

use serde::{Deserialize, Serialize};

/// The tile layout of the target board.
///
/// Each tile carries a block kind character: `'p'` for a PE/CLB tile,
/// `'m'` for a memory tile, `'i'`/`'I'` for IO tiles. The grid is stored
/// row-major, so `(x, y)` indexes column `x` of row `y`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutGrid {
    rows: Vec<Vec<char>>,
}

impl LayoutGrid {
    /// Creates a layout from row-major tile kinds.
    pub fn new(rows: Vec<Vec<char>>) -> Self {
        Self { rows }
    }

    /// Creates a layout from one string per row.
    pub fn from_rows(rows: &[&str]) -> Self {
        Self {
            rows: rows.iter().map(|r| r.chars().collect()).collect(),
        }
    }

    /// Returns the block kind at `(x, y)`, or `None` outside the board.
    pub fn get_blk_type(&self, x: u32, y: u32) -> Option<char> {
        self.rows
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
    }

    /// Returns the number of rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Returns the length of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Per-resource timing costs, in the unitless delay used by the retimer.
///
/// Field meanings follow the physical resources of the fabric: `clb_op` is
/// the compute delay of a PE operation, `clb_sb`/`mem_sb` the switch-box
/// output delay on PE/memory tiles, `mem` the access delay of a memory
/// port, `reg` the clock-to-out of a pipeline register, and `rmux` the
/// delay of a routing mux.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingCostTable {
    /// PE/CLB operation delay.
    pub clb_op: u64,
    /// Switch-box output delay on a PE/CLB tile.
    pub clb_sb: u64,
    /// Memory port access delay.
    pub mem: u64,
    /// Switch-box output delay on a memory tile.
    pub mem_sb: u64,
    /// Pipeline register clock-to-out delay.
    pub reg: u64,
    /// Routing mux delay.
    pub rmux: u64,
}
