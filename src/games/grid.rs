//! Tile grid state container
//!
//! The grid owns every cell. Cells change only through selection toggles,
//! reveals and resets issued here.

use crate::common::types::TileOutcome;
use crate::errors::GameError;
use crate::games::types::{Cell, GridSnapshot, RevealState, SelectionState};

/// Fixed-size board of tiles
#[derive(Debug, Clone)]
pub struct TileGrid {
    cells: Vec<Cell>,
    frozen: bool,
}

impl TileGrid {
    /// Create a board of `size` unselected, hidden tiles
    pub fn new(size: usize) -> Self {
        Self {
            cells: (0..size).map(Cell::new).collect(),
            frozen: false,
        }
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Flip the selection of one tile and return its new state
    pub fn toggle_selection(&mut self, index: usize) -> Result<SelectionState, GameError> {
        let size = self.size();
        let frozen = self.frozen;
        let cell = self
            .cells
            .get_mut(index)
            .ok_or(GameError::InvalidIndex { index, size })?;

        if frozen {
            return Err(GameError::SelectionFrozen);
        }

        cell.selection = cell.selection.toggled();
        Ok(cell.selection)
    }

    /// Selected tile indices in ascending order
    pub fn selected_indices(&self) -> Vec<usize> {
        self.cells
            .iter()
            .filter(|c| c.is_selected())
            .map(|c| c.index)
            .collect()
    }

    /// Lock the selection while a session owns it
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Release the selection after a session failed without revealing anything
    pub fn thaw(&mut self) {
        self.frozen = false;
    }

    /// Reveal the tiles of a frozen selection
    ///
    /// `outcomes[i]` belongs to `selection[i]`. The whole reveal is validated
    /// before any cell changes, so a rejected reveal leaves the board untouched.
    pub fn apply_reveal(&mut self, selection: &[usize], outcomes: &[TileOutcome]) -> Result<(), GameError> {
        if selection.len() != outcomes.len() {
            return Err(GameError::OutcomeMismatch {
                expected: selection.len(),
                actual: outcomes.len(),
            });
        }

        let size = self.size();
        for &index in selection {
            let cell = self.cells.get(index).ok_or(GameError::InvalidIndex { index, size })?;
            if cell.is_revealed() {
                return Err(GameError::AlreadyRevealed(index));
            }
        }

        for (&index, &outcome) in selection.iter().zip(outcomes) {
            self.cells[index].reveal = RevealState::from(outcome);
        }
        Ok(())
    }

    /// Back to a blank, unfrozen board
    pub fn reset(&mut self) {
        let size = self.size();
        self.cells = (0..size).map(Cell::new).collect();
        self.frozen = false;
    }

    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            cells: self.cells.clone(),
            frozen: self.frozen,
        }
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::new(crate::common::types::DEFAULT_GRID_SIZE)
    }
}
