// atlas_core/src/types.rs

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

// --- Core Type Aliases ---
pub type State = nalgebra::DVector<f64>;
pub type Covariance = nalgebra::DMatrix<f64>;

/// Number of entries the robot pose occupies at the head of the state vector.
pub const POSE_DIM: usize = 3;
/// Number of entries each landmark occupies in the state vector.
pub const LANDMARK_DIM: usize = 2;

/// Index of the first state entry of landmark `landmark_index`.
#[inline]
pub fn landmark_offset(landmark_index: usize) -> usize {
    POSE_DIM + LANDMARK_DIM * landmark_index
}

/// Wraps an angle into `(-pi, pi]`.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Signed shortest rotation that takes `from` onto `to`, in `(-pi, pi]`.
pub fn angle_difference(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

/// A planar robot pose in world coordinates. `theta` is kept in `(-pi, pi]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.theta)
    }

    pub fn from_vector(v: &Vector3<f64>) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    /// World position of a point given by `range` and `bearing` relative to this pose.
    pub fn project(&self, range: f64, bearing: f64) -> Vector2<f64> {
        let angle = self.theta + bearing;
        Vector2::new(self.x + range * angle.cos(), self.y + range * angle.sin())
    }
}

/// The robot's pose estimate together with its marginal covariance block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    pub pose: Pose2D,
    pub covariance: Matrix3<f64>,
}

/// A "turn in place, then drive straight" command. It is also the shape of the
/// odometry the actuation layer reports back after executing a command.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionCommand {
    /// Rotation in radians, counter-clockwise positive.
    pub turn: f64,
    /// Forward travel after the turn, in map units.
    pub distance: f64,
}

impl MotionCommand {
    pub fn new(turn: f64, distance: f64) -> Self {
        Self { turn, distance }
    }

    /// The command that leaves the robot where it is.
    pub fn stay() -> Self {
        Self::default()
    }

    pub fn is_stay(&self) -> bool {
        self.turn == 0.0 && self.distance == 0.0
    }
}

/// Integer address of an occupancy cell. Cell `(0, 0)` is centred on the
/// mission start position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The four edge-adjacent neighbours in a fixed order (+x, -x, +y, -y).
    pub fn neighbors4(self) -> [CellCoord; 4] {
        [
            CellCoord::new(self.x + 1, self.y),
            CellCoord::new(self.x - 1, self.y),
            CellCoord::new(self.x, self.y + 1),
            CellCoord::new(self.x, self.y - 1),
        ]
    }
}
