// atlas_core/src/exploration/explorer.rs

use super::{ExplorationGoal, ExplorationStep};
use crate::config::ExplorerConfig;
use crate::mapping::CollisionMap;
use crate::types::{normalize_angle, CellCoord, MotionCommand, Pose2D};
use tracing::debug;

/// Stateless frontier-exploration policy: head for the nearest reachable cell
/// that borders unknown space.
#[derive(Debug, Clone, Default)]
pub struct Explorer {
    config: ExplorerConfig,
}

impl Explorer {
    pub fn new(config: ExplorerConfig) -> Self {
        Self { config }
    }

    /// Picks the next motion command for a robot at `pose`.
    ///
    /// # Returns
    /// `ExplorationStep::Done` when no unknown cell is reachable through free
    /// space, otherwise the goal and the command that moves towards it.
    pub fn next_command(&self, pose: &Pose2D, map: &CollisionMap) -> ExplorationStep {
        let robot_cell = map.world_to_cell(&pose.position());
        let Some(frontier) = map.nearest_unknown(robot_cell) else {
            debug!(?robot_cell, "no reachable unknown space left");
            return ExplorationStep::Done;
        };

        // 1. Choose the target cell along the path.
        let target = match self.config.max_step_cells {
            Some(k) => frontier.path[k.min(frontier.path.len() - 1)],
            None => frontier.cell,
        };

        // 2. Build the command.
        let command = if target == robot_cell {
            // Standing on the frontier: look at the unknown neighbour without moving.
            let facing = Self::command_towards(pose, map, frontier.unknown_neighbor);
            MotionCommand::new(facing.turn, 0.0)
        } else {
            Self::command_towards(pose, map, target)
        };

        debug!(
            frontier = ?frontier.cell,
            depth = frontier.depth(),
            ?target,
            turn = command.turn,
            distance = command.distance,
            "exploration goal"
        );
        ExplorationStep::Goal(ExplorationGoal {
            frontier,
            target,
            command,
        })
    }

    fn command_towards(pose: &Pose2D, map: &CollisionMap, cell: CellCoord) -> MotionCommand {
        let delta = map.cell_center(cell) - pose.position();
        MotionCommand::new(
            normalize_angle(delta.y.atan2(delta.x) - pose.theta),
            delta.x.hypot(delta.y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::mapping::GridSnapshot;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    /// Map from rows given top row first; the bottom-left cell is `origin`.
    fn map_from_rows(origin: CellCoord, rows: &[&str]) -> CollisionMap {
        let snapshot = GridSnapshot {
            version: crate::mapping::snapshot::SNAPSHOT_VERSION,
            resolution: 1.0,
            width: rows[0].len(),
            height: rows.len(),
            rows: rows.iter().map(|r| r.to_string()).collect(),
            origin,
        };
        CollisionMap::from_snapshot(&snapshot, MapConfig::default()).expect("valid snapshot")
    }

    #[test]
    fn test_done_when_nothing_reachable_is_unknown() {
        let map = map_from_rows(
            CellCoord::new(-2, -2),
            &[
                "#####", //
                "#...#", //
                "#...#", //
                "#...#", //
                "#####",
            ],
        );
        let step = Explorer::default().next_command(&Pose2D::default(), &map);
        assert_eq!(step, ExplorationStep::Done);
    }

    #[test]
    fn test_heads_for_nearest_frontier() {
        // Robot at (0,0); out-of-grid space beyond x = -1 is closer than the unknown cell at x = 3.
        let map = map_from_rows(
            CellCoord::new(-1, -1),
            &[
                "#####", //
                "....?", //
                "#####",
            ],
        );
        let pose = Pose2D::new(0.0, 0.0, FRAC_PI_2);
        let ExplorationStep::Goal(goal) = Explorer::default().next_command(&pose, &map) else {
            panic!("expected a goal");
        };

        assert_eq!(goal.frontier.cell, CellCoord::new(-1, 0));
        assert_eq!(goal.target, CellCoord::new(-1, 0));
        assert_abs_diff_eq!(goal.command.turn, FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(goal.command.distance, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_observes_in_place_when_standing_on_frontier() {
        let map = map_from_rows(
            CellCoord::new(-1, -1),
            &[
                "#?#", //
                "#.#", //
                "###",
            ],
        );
        let ExplorationStep::Goal(goal) = Explorer::default().next_command(&Pose2D::new(0.0, 0.0, PI), &map) else {
            panic!("expected a goal");
        };

        assert_eq!(goal.target, CellCoord::new(0, 0));
        assert_eq!(goal.frontier.unknown_neighbor, CellCoord::new(0, 1));
        assert_abs_diff_eq!(goal.command.distance, 0.0);
        assert_abs_diff_eq!(goal.command.turn, -FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_max_step_cells_limits_advance() {
        let map = map_from_rows(
            CellCoord::new(0, -1),
            &[
                "#######", //
                "......?", //
                "#######",
            ],
        );
        // Robot at the closed end of the corridor, the nearest frontier is (5, 0).
        let closed = map_from_rows(
            CellCoord::new(-1, -1),
            &[
                "########", //
                "#......?", //
                "########",
            ],
        );
        let explorer = Explorer::new(ExplorerConfig {
            max_step_cells: Some(2),
        });
        let ExplorationStep::Goal(goal) = explorer.next_command(&Pose2D::default(), &closed) else {
            panic!("expected a goal");
        };
        assert_eq!(goal.frontier.cell, CellCoord::new(5, 0));
        assert_eq!(goal.target, CellCoord::new(2, 0));
        assert_abs_diff_eq!(goal.command.distance, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(goal.command.turn, 0.0, epsilon = 1e-12);

        // On the open map the robot already stands on the frontier.
        let ExplorationStep::Goal(goal) = explorer.next_command(&Pose2D::default(), &map) else {
            panic!("expected a goal");
        };
        assert_eq!(goal.target, CellCoord::new(0, 0));
        assert_abs_diff_eq!(goal.command.distance, 0.0);
    }
}
