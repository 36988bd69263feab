// atlas_core/src/slam/mission.rs

use super::{RobotInterface, Slam};
use crate::error::SlamResult;
use crate::exploration::{ExplorationGoal, ExplorationStep};
use crate::mapping::CellState;
use crate::types::PoseEstimate;
use tracing::{debug, info};

/// Result of a single mission step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The robot moved towards `goal` and the resulting sweep was fused.
    Advanced(ExplorationGoal),
    /// Nothing reachable is left to explore.
    Complete,
}

/// End-of-mission statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionSummary {
    pub steps: usize,
    /// Whether the explorer ran out of frontiers (as opposed to hitting the step limit).
    pub completed: bool,
    pub final_pose: PoseEstimate,
    pub landmarks: usize,
    pub free_cells: usize,
    pub occupied_cells: usize,
    pub unknown_cells: usize,
}

/// Drives the explore / act / sense / fuse cycle against a robot.
pub struct Mission<R: RobotInterface> {
    slam: Slam,
    robot: R,
    steps: usize,
    initial_sweep_done: bool,
}

impl<R: RobotInterface> Mission<R> {
    pub fn new(slam: Slam, robot: R) -> Self {
        Self {
            slam,
            robot,
            steps: 0,
            initial_sweep_done: false,
        }
    }

    pub fn slam(&self) -> &Slam {
        &self.slam
    }

    pub fn robot(&self) -> &R {
        &self.robot
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn into_parts(self) -> (Slam, R) {
        (self.slam, self.robot)
    }

    /// Runs one cycle. The very first call observes in place before moving.
    ///
    /// Odometry is predicted as soon as the robot reports it, so motion that
    /// already happened is never lost when the following sweep fails.
    pub fn step(&mut self) -> SlamResult<StepOutcome> {
        if !self.initial_sweep_done {
            let sweep = self.robot.sweep()?;
            self.slam.observe(&sweep)?;
            self.initial_sweep_done = true;
            debug!("initial sweep fused");
        }

        let goal = match self.slam.next_step() {
            ExplorationStep::Done => return Ok(StepOutcome::Complete),
            ExplorationStep::Goal(goal) => goal,
        };

        // 1. Act and predict.
        let odometry = self.robot.execute(&goal.command)?;
        if !odometry.is_stay() {
            self.slam.move_robot(odometry.turn, odometry.distance);
        }
        self.steps += 1;

        // 2. Sense and fuse.
        let sweep = self.robot.sweep()?;
        self.slam.observe(&sweep)?;

        Ok(StepOutcome::Advanced(goal))
    }

    /// Steps until the explorer is done or `max_steps` cycles have run.
    pub fn run(&mut self, max_steps: usize) -> SlamResult<MissionSummary> {
        info!(max_steps, "mission started");
        let mut completed = false;
        while self.steps < max_steps {
            match self.step()? {
                StepOutcome::Complete => {
                    completed = true;
                    break;
                }
                StepOutcome::Advanced(goal) => {
                    if self.steps % 10 == 0 {
                        let pose = self.slam.pose().pose;
                        info!(
                            step = self.steps,
                            x = pose.x,
                            y = pose.y,
                            landmarks = self.slam.landmark_count(),
                            frontier = ?goal.frontier.cell,
                            "mission progress"
                        );
                    }
                }
            }
        }

        let summary = self.summary(completed);
        info!(
            steps = summary.steps,
            completed = summary.completed,
            landmarks = summary.landmarks,
            "mission finished"
        );
        Ok(summary)
    }

    pub fn summary(&self, completed: bool) -> MissionSummary {
        let map = self.slam.collision_map();
        MissionSummary {
            steps: self.steps,
            completed,
            final_pose: self.slam.pose(),
            landmarks: self.slam.landmark_count(),
            free_cells: map.count(CellState::Free),
            occupied_cells: map.count(CellState::Occupied),
            unknown_cells: map.count(CellState::Unknown),
        }
    }
}
