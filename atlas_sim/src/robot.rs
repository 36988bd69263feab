// atlas_sim/src/robot.rs

use crate::world::World;
use atlas_core::error::RobotError;
use atlas_core::messages::{RangeReading, Sweep};
use atlas_core::slam::RobotInterface;
use atlas_core::types::{normalize_angle, MotionCommand, Pose2D};
use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use tracing::{debug, trace};

/// Kinematics and sensor characteristics of the simulated robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Starting pose `[x, y, theta]` in world coordinates.
    pub start: [f64; 3],
    /// Number of beams in a full-revolution sweep.
    pub beams: usize,
    pub max_range: f64,
    /// Standard deviation of the additive range noise.
    pub range_noise_std: f64,
    /// Probability that a beam reports no usable value.
    pub dropout_probability: f64,
    /// Standard deviation of the turn error, per radian commanded.
    pub turn_noise_std: f64,
    /// Standard deviation of the distance error, per unit commanded.
    pub distance_noise_std: f64,
    /// The robot stops this far short of any surface in its way.
    pub clearance: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            start: [0.0, 0.0, 0.0],
            beams: 360,
            max_range: 6.0,
            range_noise_std: 0.01,
            dropout_probability: 0.01,
            turn_noise_std: 0.02,
            distance_noise_std: 0.03,
            clearance: 0.2,
        }
    }
}

/// A differential-drive robot with a spinning range finder in a `World`.
///
/// The robot reports the odometry it believes it executed; its true pose
/// drifts from that by the configured actuation noise.
#[derive(Debug, Clone)]
pub struct SimRobot {
    world: World,
    config: RobotConfig,
    pose: Pose2D,
    rng: ChaCha8Rng,
    unit_normal: Normal<f64>,
    sweeps: usize,
}

impl SimRobot {
    pub fn new(world: World, config: RobotConfig, seed: u64) -> anyhow::Result<Self> {
        let [x, y, theta] = config.start;
        let pose = Pose2D::new(x, y, theta);
        anyhow::ensure!(config.beams >= 3, "robot.beams must be at least 3");
        anyhow::ensure!(config.max_range > 0.0, "robot.max_range must be > 0");
        anyhow::ensure!(
            (0.0..=1.0).contains(&config.dropout_probability),
            "robot.dropout_probability must be within [0, 1]"
        );
        anyhow::ensure!(
            world.is_free(&pose.position()),
            "robot start ({x}, {y}) is not in free space"
        );

        Ok(Self {
            world,
            config,
            pose,
            rng: ChaCha8Rng::seed_from_u64(seed),
            unit_normal: Normal::new(0.0, 1.0)?,
            sweeps: 0,
        })
    }

    /// Ground-truth pose.
    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn sweeps_taken(&self) -> usize {
        self.sweeps
    }

    fn noise(&mut self, std: f64) -> f64 {
        std * self.unit_normal.sample(&mut self.rng)
    }
}

impl RobotInterface for SimRobot {
    fn execute(&mut self, command: &MotionCommand) -> Result<MotionCommand, RobotError> {
        if !command.turn.is_finite() || !command.distance.is_finite() {
            return Err(RobotError::Actuation(format!("non-finite command {command:?}")));
        }

        // 1. Turn in place.
        let turn_error = self.noise(self.config.turn_noise_std * command.turn.abs());
        let heading = normalize_angle(self.pose.theta + command.turn + turn_error);

        // 2. Drive, stopping short of whatever is ahead.
        let ahead = self.world.cast(&self.pose.position(), heading);
        let free = (ahead - self.config.clearance).max(0.0);
        let planned = command.distance.clamp(0.0, free);
        let travelled = (planned + self.noise(self.config.distance_noise_std * planned)).clamp(0.0, free);

        self.pose = Pose2D::new(
            self.pose.x + travelled * heading.cos(),
            self.pose.y + travelled * heading.sin(),
            heading,
        );
        if planned < command.distance {
            debug!(commanded = command.distance, planned, "motion cut short by an obstacle");
        }
        trace!(x = self.pose.x, y = self.pose.y, theta = self.pose.theta, "true pose");

        Ok(MotionCommand::new(command.turn, planned))
    }

    fn sweep(&mut self) -> Result<Sweep, RobotError> {
        let increment = TAU / self.config.beams as f64;
        let origin: Vector2<f64> = self.pose.position();
        let readings = (0..self.config.beams)
            .map(|i| {
                if self.rng.gen::<f64>() < self.config.dropout_probability {
                    return RangeReading::invalid();
                }
                let truth = self.world.cast(&origin, self.pose.theta + i as f64 * increment);
                if truth >= self.config.max_range {
                    return RangeReading::new(self.config.max_range);
                }
                let measured = truth + self.noise(self.config.range_noise_std);
                RangeReading::new(measured.max(0.0))
            })
            .collect();

        self.sweeps += 1;
        Ok(Sweep::new(0.0, increment, self.config.max_range, readings))
    }
}
