// atlas_core/src/slam/mod.rs

use crate::config::SlamConfig;
use crate::error::{RobotError, SlamResult};
use crate::estimation::{ExtendedKalmanFilter, ObservationOutcome};
use crate::exploration::{ExplorationStep, Explorer};
use crate::mapping::{CollisionMap, GridSnapshot, IntegrationReport};
use crate::messages::Sweep;
use crate::perception::LandmarkExtractor;
use crate::types::{MotionCommand, PoseEstimate};
use tracing::debug;

pub mod mission;

pub use mission::{Mission, MissionSummary, StepOutcome};

// --- ACTUATION / SENSING BOUNDARY ---
// Implemented by whatever drives the physical or simulated robot.
pub trait RobotInterface {
    /// Carries out `command` and returns the odometry actually travelled.
    fn execute(&mut self, command: &MotionCommand) -> Result<MotionCommand, RobotError>;

    /// Takes one range sweep from the robot's current pose.
    fn sweep(&mut self) -> Result<Sweep, RobotError>;
}

/// What one `Slam::observe` call did.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserveReport {
    /// Per-observation results, in the (bearing) order they were processed.
    pub outcomes: Vec<ObservationOutcome>,
    pub new_landmarks: Vec<usize>,
    /// Existing landmarks the sweep was associated with, corrected or not.
    pub associated_landmarks: Vec<usize>,
    pub map: IntegrationReport,
}

impl ObserveReport {
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ObservationOutcome::Skipped(_)))
            .count()
    }
}

/// The SLAM orchestrator. Owns the filter and the collision map; the
/// explorer only ever borrows them.
#[derive(Debug, Clone)]
pub struct Slam {
    config: SlamConfig,
    extractor: LandmarkExtractor,
    ekf: ExtendedKalmanFilter,
    map: CollisionMap,
    explorer: Explorer,
}

impl Slam {
    pub fn new(config: SlamConfig) -> SlamResult<Self> {
        config.validate()?;
        Ok(Self {
            extractor: LandmarkExtractor::new(&config.extraction),
            ekf: ExtendedKalmanFilter::new(config.ekf.clone()),
            map: CollisionMap::new(config.map.clone())?,
            explorer: Explorer::new(config.exploration.clone()),
            config,
        })
    }

    /// Applies odometry to the pose estimate.
    pub fn move_robot(&mut self, turn: f64, distance: f64) {
        self.ekf.predict(turn, distance);
    }

    /// Fuses one sweep: extract landmarks, stage the filter update, integrate
    /// the sweep into the map from the staged pose, then commit.
    ///
    /// If integration fails the filter is left as it was.
    pub fn observe(&mut self, sweep: &Sweep) -> SlamResult<ObserveReport> {
        // 1. Extract.
        let observations = self.extractor.extract(sweep);

        // 2. Stage the filter update.
        let staged = self.ekf.stage_update(&observations);

        // 3. Integrate against the corrected pose.
        let map = self.map.integrate(&staged.pose(), sweep)?;

        // 4. Commit.
        let outcomes = self.ekf.commit(staged);
        let new_landmarks = outcomes
            .iter()
            .filter_map(|o| match o {
                ObservationOutcome::Added { landmark } => Some(*landmark),
                _ => None,
            })
            .collect();
        let associated_landmarks = outcomes
            .iter()
            .filter_map(|o| match o {
                ObservationOutcome::Corrected { landmark, .. } | ObservationOutcome::Reobserved { landmark, .. } => {
                    Some(*landmark)
                }
                _ => None,
            })
            .collect();

        let report = ObserveReport {
            outcomes,
            new_landmarks,
            associated_landmarks,
            map,
        };
        debug!(
            observations = observations.len(),
            new = report.new_landmarks.len(),
            associated = report.associated_landmarks.len(),
            skipped = report.skipped(),
            "observed sweep"
        );
        Ok(report)
    }

    /// Asks the explorer where to go next from the current estimate.
    pub fn next_step(&self) -> ExplorationStep {
        self.explorer.next_command(&self.ekf.pose().pose, &self.map)
    }

    // --- Queries ---

    pub fn pose(&self) -> PoseEstimate {
        self.ekf.pose()
    }

    pub fn collision_map(&self) -> &CollisionMap {
        &self.map
    }

    pub fn snapshot(&self) -> GridSnapshot {
        self.map.snapshot()
    }

    pub fn ekf(&self) -> &ExtendedKalmanFilter {
        &self.ekf
    }

    pub fn landmark_count(&self) -> usize {
        self.ekf.landmark_count()
    }

    pub fn config(&self) -> &SlamConfig {
        &self.config
    }
}
