// atlas_core/src/prelude.rs

// --- Core Abstractions ---
pub use crate::models::{MeasurementModel, MotionModel};
pub use crate::perception::FeatureDetector;
pub use crate::slam::RobotInterface;

// --- Core Data Structures ---
pub use crate::messages::{LandmarkDescriptor, LandmarkKind, Observation, RangeReading, Sweep};
pub use crate::types::{CellCoord, MotionCommand, Pose2D, PoseEstimate};

// --- Components ---
pub use crate::estimation::{ExtendedKalmanFilter, ObservationOutcome};
pub use crate::exploration::{ExplorationGoal, ExplorationStep, Explorer};
pub use crate::mapping::{CellState, CollisionMap, GridSnapshot};
pub use crate::perception::LandmarkExtractor;
pub use crate::slam::{Mission, MissionSummary, Slam, StepOutcome};

// --- Configuration & Errors ---
pub use crate::config::SlamConfig;
pub use crate::error::{RobotError, SlamError, SlamResult};
