use crate::common::types::TileOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the player picked a tile
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectionState {
    #[default]
    Unselected,
    Selected,
}

impl SelectionState {
    pub fn toggled(self) -> Self {
        match self {
            SelectionState::Unselected => SelectionState::Selected,
            SelectionState::Selected => SelectionState::Unselected,
        }
    }
}

/// What is known about a tile's content
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RevealState {
    #[default]
    Hidden,
    Mine,
    Gem,
}

impl From<TileOutcome> for RevealState {
    fn from(outcome: TileOutcome) -> Self {
        match outcome {
            TileOutcome::Mine => RevealState::Mine,
            TileOutcome::Gem => RevealState::Gem,
        }
    }
}

impl fmt::Display for RevealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevealState::Hidden => write!(f, "hidden"),
            RevealState::Mine => write!(f, "mine"),
            RevealState::Gem => write!(f, "gem"),
        }
    }
}

/// One grid position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cell {
    pub index: usize,
    pub selection: SelectionState,
    pub reveal: RevealState,
}

impl Cell {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            selection: SelectionState::Unselected,
            reveal: RevealState::Hidden,
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selection == SelectionState::Selected
    }

    pub fn is_revealed(&self) -> bool {
        self.reveal != RevealState::Hidden
    }
}

/// Read-only copy of the board for the rendering surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridSnapshot {
    pub cells: Vec<Cell>,
    /// Selection can no longer be changed
    pub frozen: bool,
}

impl GridSnapshot {
    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn count(&self, reveal: RevealState) -> usize {
        self.cells.iter().filter(|c| c.reveal == reveal).count()
    }
}
