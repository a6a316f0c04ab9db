//! Board and session state
//!
//! The grid holds selection and reveal state, a bet session packages one
//! frozen selection with its wager, and the tracker walks the session's
//! transaction through its lifecycle.

pub mod grid;
pub mod session;
pub mod tracker;
pub mod types;

pub use grid::TileGrid;
pub use session::{wager_to_wei, BetSession, SessionView};
pub use tracker::{StatusUpdate, TransactionTracker, TxStatus};
pub use types::*;
