// atlas_core/src/models/mod.rs

use crate::types::MotionCommand;
use nalgebra::{Matrix2, Matrix2x3, Matrix3, Matrix3x2, Vector2, Vector3};
use std::fmt::Debug;

pub mod measurement;
pub mod motion;

pub use measurement::RangeBearing;
pub use motion::TurnThenDrive;

// --- MOTION MODEL TRAIT ---
// The robot's transition function `x' = f(x, u)` over the pose `(x, y, theta)`.
pub trait MotionModel: Debug + Clone + Send + Sync {
    /// Applies `command` to `pose` and returns the new pose with theta normalized.
    fn propagate(&self, pose: &Vector3<f64>, command: &MotionCommand) -> Vector3<f64>;

    /// Calculates the Jacobians `(F = ∂f/∂x, V = ∂f/∂u)` at the given pose and command,
    /// where `u = (turn, distance)`.
    fn calculate_jacobians(&self, pose: &Vector3<f64>, command: &MotionCommand) -> (Matrix3<f64>, Matrix3x2<f64>);

    /// Covariance of the command in control space `(turn, distance)`.
    fn control_noise(&self, command: &MotionCommand) -> Matrix2<f64>;

    /// Process noise mapped into pose space: `Q = V M Vᵀ`.
    fn process_noise(&self, pose: &Vector3<f64>, command: &MotionCommand) -> Matrix3<f64> {
        let (_, v_jac) = self.calculate_jacobians(pose, command);
        v_jac * self.control_noise(command) * v_jac.transpose()
    }
}

// --- MEASUREMENT MODEL TRAIT ---
// A point-landmark sensor model `z = h(pose, landmark) + v` with a 2-D measurement.
pub trait MeasurementModel: Debug + Clone + Send + Sync {
    /// Predicts the ideal measurement of `landmark` seen from `pose`.
    /// Returns `None` when the geometry is degenerate (landmark on top of the sensor).
    fn predict_measurement(&self, pose: &Vector3<f64>, landmark: &Vector2<f64>) -> Option<Vector2<f64>>;

    /// Calculates `(H_pose = ∂h/∂pose, H_landmark = ∂h/∂landmark)`.
    /// Returns `None` under the same degeneracy as `predict_measurement`.
    fn calculate_jacobians(
        &self,
        pose: &Vector3<f64>,
        landmark: &Vector2<f64>,
    ) -> Option<(Matrix2x3<f64>, Matrix2<f64>)>;

    /// `z - z_hat`, with any angular components wrapped.
    fn innovation(&self, z: &Vector2<f64>, z_hat: &Vector2<f64>) -> Vector2<f64>;

    /// Measurement noise covariance `R` for the measurement `z`.
    fn noise(&self, z: &Vector2<f64>) -> Matrix2<f64>;

    /// Inverse model: the landmark position implied by measurement `z` taken from `pose`.
    fn initialize_landmark(&self, pose: &Vector3<f64>, z: &Vector2<f64>) -> Vector2<f64>;

    /// Jacobians of the inverse model `(G_pose, G_z)`.
    fn initialization_jacobians(&self, pose: &Vector3<f64>, z: &Vector2<f64>) -> (Matrix2x3<f64>, Matrix2<f64>);
}
