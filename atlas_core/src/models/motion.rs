// atlas_core/src/models/motion.rs

use super::MotionModel;
use crate::config::EkfConfig;
use crate::types::{normalize_angle, MotionCommand};
use nalgebra::{Matrix2, Matrix3, Matrix3x2, Vector3};

/// Differential-drive style motion: rotate in place by `turn`, then drive
/// `distance` along the new heading.
///
/// Noise grows with the magnitude of each component, so a command of zero
/// turn and zero distance is noise-free.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnThenDrive {
    /// Variance per radian turned.
    pub turn_noise: f64,
    /// Variance per unit of distance driven.
    pub distance_noise: f64,
}

impl TurnThenDrive {
    pub fn new(turn_noise: f64, distance_noise: f64) -> Self {
        Self {
            turn_noise,
            distance_noise,
        }
    }
}

impl From<&EkfConfig> for TurnThenDrive {
    fn from(config: &EkfConfig) -> Self {
        Self::new(config.turn_noise, config.distance_noise)
    }
}

impl MotionModel for TurnThenDrive {
    fn propagate(&self, pose: &Vector3<f64>, command: &MotionCommand) -> Vector3<f64> {
        let heading = pose[2] + command.turn;
        Vector3::new(
            pose[0] + command.distance * heading.cos(),
            pose[1] + command.distance * heading.sin(),
            normalize_angle(heading),
        )
    }

    fn calculate_jacobians(&self, pose: &Vector3<f64>, command: &MotionCommand) -> (Matrix3<f64>, Matrix3x2<f64>) {
        let heading = pose[2] + command.turn;
        let (sin_h, cos_h) = heading.sin_cos();
        let d = command.distance;

        #[rustfmt::skip]
        let f_jac = Matrix3::new(
            1.0, 0.0, -d * sin_h,
            0.0, 1.0,  d * cos_h,
            0.0, 0.0,  1.0,
        );

        // Columns: ∂/∂turn, ∂/∂distance
        #[rustfmt::skip]
        let v_jac = Matrix3x2::new(
            -d * sin_h, cos_h,
             d * cos_h, sin_h,
             1.0,       0.0,
        );

        (f_jac, v_jac)
    }

    fn control_noise(&self, command: &MotionCommand) -> Matrix2<f64> {
        Matrix2::new(
            self.turn_noise * command.turn.abs(),
            0.0,
            0.0,
            self.distance_noise * command.distance.abs(),
        )
    }
}
