// atlas_core/src/exploration/mod.rs

use crate::mapping::Frontier;
use crate::types::{CellCoord, MotionCommand};

pub mod explorer;

pub use explorer::Explorer;

/// Where the explorer wants to go next and how to get there.
/// Recomputed from the current map every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorationGoal {
    pub frontier: Frontier,
    /// The cell the command drives to (the frontier itself or a waypoint on its path).
    pub target: CellCoord,
    pub command: MotionCommand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExplorationStep {
    Goal(ExplorationGoal),
    /// No unknown space is reachable through known-free cells.
    Done,
}
