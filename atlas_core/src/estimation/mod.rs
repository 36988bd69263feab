// atlas_core/src/estimation/mod.rs

use crate::messages::LandmarkDescriptor;
use crate::types::{landmark_offset, normalize_angle, Covariance, Pose2D, State, LANDMARK_DIM, POSE_DIM};
use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};

pub mod ekf;

pub use ekf::{ExtendedKalmanFilter, ObservationOutcome, SkipReason, StagedUpdate};

/// Bookkeeping kept alongside each landmark's state entries.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkRecord {
    /// The descriptor of the observation that created the landmark.
    pub descriptor: Option<LandmarkDescriptor>,
    /// How many times the landmark has been seen, its creation included.
    pub observations: u32,
}

/// The joint SLAM state: mean over `(x, y, theta, l0x, l0y, l1x, ...)`, its
/// covariance and the per-landmark records.
///
/// Landmarks are only ever appended; index `i` stays valid for the lifetime of
/// the state.
#[derive(Debug, Clone, PartialEq)]
pub struct SlamState {
    pub mean: State,
    pub covariance: Covariance,
    pub landmarks: Vec<LandmarkRecord>,
}

impl SlamState {
    /// A state with no landmarks, the robot at `pose` with isotropic variance.
    pub fn new(pose: Pose2D, pose_variance: f64) -> Self {
        Self {
            mean: State::from_column_slice(pose.as_vector().as_slice()),
            covariance: Covariance::identity(POSE_DIM, POSE_DIM) * pose_variance,
            landmarks: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn landmark_count(&self) -> usize {
        self.landmarks.len()
    }

    pub fn pose_vector(&self) -> Vector3<f64> {
        self.mean.fixed_rows::<POSE_DIM>(0).into_owned()
    }

    pub fn pose(&self) -> Pose2D {
        Pose2D::from_vector(&self.pose_vector())
    }

    pub fn pose_covariance(&self) -> Matrix3<f64> {
        self.covariance.fixed_view::<POSE_DIM, POSE_DIM>(0, 0).into_owned()
    }

    pub fn landmark_position(&self, index: usize) -> Option<Vector2<f64>> {
        (index < self.landmark_count())
            .then(|| self.mean.fixed_rows::<LANDMARK_DIM>(landmark_offset(index)).into_owned())
    }

    pub fn landmark_covariance(&self, index: usize) -> Option<Matrix2<f64>> {
        (index < self.landmark_count()).then(|| {
            let offset = landmark_offset(index);
            self.covariance
                .fixed_view::<LANDMARK_DIM, LANDMARK_DIM>(offset, offset)
                .into_owned()
        })
    }

    pub fn is_finite(&self) -> bool {
        self.mean.iter().all(|v| v.is_finite()) && self.covariance.iter().all(|v| v.is_finite())
    }

    /// Restores the structural invariants after a numerical step: symmetric
    /// covariance, non-negative variances, heading in `(-pi, pi]`.
    pub fn condition(&mut self) {
        let symmetric = (&self.covariance + self.covariance.transpose()) * 0.5;
        self.covariance = symmetric;
        for i in 0..self.dim() {
            if self.covariance[(i, i)] < 0.0 {
                self.covariance[(i, i)] = 0.0;
            }
        }
        self.mean[2] = normalize_angle(self.mean[2]);
    }

    /// Appends a landmark at `position`.
    ///
    /// # Arguments
    /// * `landmark_cov` - The new landmark's own 2x2 covariance block.
    /// * `cross_cov` - Its 2 x dim cross-covariance with the existing state.
    pub(crate) fn augment(
        &mut self,
        position: Vector2<f64>,
        landmark_cov: Matrix2<f64>,
        cross_cov: nalgebra::DMatrix<f64>,
        record: LandmarkRecord,
    ) -> usize {
        let n = self.dim();
        let new_dim = n + LANDMARK_DIM;

        let mut mean = State::zeros(new_dim);
        mean.rows_mut(0, n).copy_from(&self.mean);
        mean.fixed_rows_mut::<LANDMARK_DIM>(n).copy_from(&position);

        let mut covariance = Covariance::zeros(new_dim, new_dim);
        covariance.view_mut((0, 0), (n, n)).copy_from(&self.covariance);
        covariance.view_mut((n, 0), (LANDMARK_DIM, n)).copy_from(&cross_cov);
        covariance
            .view_mut((0, n), (n, LANDMARK_DIM))
            .copy_from(&cross_cov.transpose());
        covariance
            .fixed_view_mut::<LANDMARK_DIM, LANDMARK_DIM>(n, n)
            .copy_from(&landmark_cov);

        self.mean = mean;
        self.covariance = covariance;
        self.landmarks.push(record);
        self.condition();
        self.landmarks.len() - 1
    }
}
