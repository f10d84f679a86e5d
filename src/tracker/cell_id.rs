use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a drift cell.
///
/// Cells are ordered by side, then layer, then row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId {
    /// 0 for the `x < 0` half of the tracker, 1 for the `x > 0` half.
    pub side: u8,
    /// Layer index, 0 next to the source foil.
    pub layer: u32,
    /// Row index, 0 at the lowest `y`.
    pub row: u32,
}

impl CellId {
    pub fn new(side: u8, layer: u32, row: u32) -> Self {
        CellId { side, layer, row }
    }

    /// Chebyshev distance between two cells of the same side, `None` across the foil.
    pub fn distance(&self, other: &CellId) -> Option<u32> {
        (self.side == other.side)
            .then(|| self.layer.abs_diff(other.layer).max(self.row.abs_diff(other.row)))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}.{}.{}]", self.side, self.layer, self.row)
    }
}
