//! Finds the combinations of stocked pipe lengths that come closest to a
//! desired length without going over it.

pub mod error;
pub mod history;
pub mod input;
pub mod render;
pub mod scale;
pub mod solver;
pub mod types;

pub use error::{Error, Result};
pub use scale::Scale;
pub use solver::{Solver, TieBreak};
pub use types::{Direction, InventoryItem, ResultSet, SolutionRecord};
