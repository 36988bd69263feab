// atlas_core/src/estimation/ekf.rs

use super::{LandmarkRecord, SlamState};
use crate::config::EkfConfig;
use crate::messages::Observation;
use crate::models::{MeasurementModel, MotionModel, RangeBearing, TurnThenDrive};
use crate::types::{landmark_offset, MotionCommand, Pose2D, PoseEstimate, LANDMARK_DIM, POSE_DIM};
use nalgebra::{DMatrix, Matrix2, Matrix2x3, Vector2};
use tracing::{debug, warn};

/// Why an observation did not touch the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Non-finite or non-positive range, or a non-finite bearing.
    InvalidMeasurement,
    /// A compatible landmark sits on top of the robot, so its bearing is undefined.
    DegenerateGeometry,
    /// The innovation covariance of the chosen association could not be inverted.
    SingularInnovation,
    /// The update produced non-finite numbers and was discarded.
    NumericalFailure,
}

/// What the filter did with one observation of a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObservationOutcome {
    /// Associated with a confirmed landmark and fused into the state.
    Corrected { landmark: usize, distance_sq: f64 },
    /// Associated with a landmark that has not been seen often enough to be
    /// trusted yet; only its sighting counter moved.
    Reobserved { landmark: usize, observations: u32 },
    /// Nothing inside the gate; a new landmark was appended.
    Added { landmark: usize },
    Skipped(SkipReason),
}

impl ObservationOutcome {
    /// The landmark index this outcome refers to, if any.
    pub fn landmark(&self) -> Option<usize> {
        match self {
            Self::Corrected { landmark, .. } | Self::Reobserved { landmark, .. } | Self::Added { landmark } => {
                Some(*landmark)
            }
            Self::Skipped(_) => None,
        }
    }
}

/// The result of running a batch of observations against a copy of the state.
/// Nothing is applied until it is passed to `ExtendedKalmanFilter::commit`.
#[derive(Debug, Clone)]
pub struct StagedUpdate {
    state: SlamState,
    outcomes: Vec<ObservationOutcome>,
}

impl StagedUpdate {
    pub fn state(&self) -> &SlamState {
        &self.state
    }

    /// The pose the filter will report once this update is committed.
    pub fn pose(&self) -> Pose2D {
        self.state.pose()
    }

    pub fn outcomes(&self) -> &[ObservationOutcome] {
        &self.outcomes
    }
}

/// Best association candidate for one observation.
struct Association {
    landmark: usize,
    distance_sq: f64,
    innovation: Vector2<f64>,
    s: Matrix2<f64>,
    h_pose: Matrix2x3<f64>,
    h_landmark: Matrix2<f64>,
}

/// EKF-SLAM over the robot pose and an append-only set of point landmarks.
///
/// The motion and measurement models are chosen statically; the defaults are
/// the turn-then-drive odometry model and a range-bearing sensor.
#[derive(Debug, Clone)]
pub struct ExtendedKalmanFilter<M: MotionModel = TurnThenDrive, H: MeasurementModel = RangeBearing> {
    state: SlamState,
    config: EkfConfig,
    motion: M,
    measurement: H,
}

impl ExtendedKalmanFilter {
    /// Creates a filter with the default models, the robot at the origin.
    pub fn new(config: EkfConfig) -> Self {
        let motion = TurnThenDrive::from(&config);
        let measurement = RangeBearing::from(&config);
        Self::with_models(config, motion, measurement)
    }
}

impl<M: MotionModel, H: MeasurementModel> ExtendedKalmanFilter<M, H> {
    pub fn with_models(config: EkfConfig, motion: M, measurement: H) -> Self {
        Self {
            state: SlamState::new(Pose2D::default(), config.initial_pose_variance),
            config,
            motion,
            measurement,
        }
    }

    // --- Queries ---

    pub fn pose(&self) -> PoseEstimate {
        PoseEstimate {
            pose: self.state.pose(),
            covariance: self.state.pose_covariance(),
        }
    }

    pub fn landmark(&self, index: usize) -> Option<Vector2<f64>> {
        self.state.landmark_position(index)
    }

    pub fn landmarks(&self) -> Vec<Vector2<f64>> {
        (0..self.state.landmark_count())
            .filter_map(|i| self.state.landmark_position(i))
            .collect()
    }

    pub fn landmark_records(&self) -> &[LandmarkRecord] {
        &self.state.landmarks
    }

    pub fn landmark_count(&self) -> usize {
        self.state.landmark_count()
    }

    pub fn state(&self) -> &SlamState {
        &self.state
    }

    pub fn config(&self) -> &EkfConfig {
        &self.config
    }

    // --- Prediction ---

    /// Propagates the pose by "turn, then drive" odometry.
    ///
    /// Only the pose block and the pose/landmark cross-covariances change;
    /// landmark-landmark blocks are untouched. Non-finite commands are ignored.
    pub fn predict(&mut self, turn: f64, distance: f64) {
        if !turn.is_finite() || !distance.is_finite() {
            warn!(turn, distance, "ignoring non-finite motion command");
            return;
        }
        let command = MotionCommand::new(turn, distance);
        let pose = self.state.pose_vector();
        let n = self.state.dim();

        // 1. Propagate the mean.
        let new_pose = self.motion.propagate(&pose, &command);
        self.state.mean.fixed_rows_mut::<POSE_DIM>(0).copy_from(&new_pose);

        // 2. Linearize and map the control noise into pose space.
        let (f_jac, _) = self.motion.calculate_jacobians(&pose, &command);
        let q = self.motion.process_noise(&pose, &command);

        // 3. P_pp = F P_pp Fᵀ + Q and P_pl = F P_pl.
        let p_pp = self.state.pose_covariance();
        let p_pp_new = f_jac * p_pp * f_jac.transpose() + q;
        self.state
            .covariance
            .fixed_view_mut::<POSE_DIM, POSE_DIM>(0, 0)
            .copy_from(&p_pp_new);

        if n > POSE_DIM {
            let p_pl = self
                .state
                .covariance
                .view((0, POSE_DIM), (POSE_DIM, n - POSE_DIM))
                .clone_owned();
            let p_pl_new = f_jac * p_pl;
            self.state
                .covariance
                .view_mut((0, POSE_DIM), (POSE_DIM, n - POSE_DIM))
                .copy_from(&p_pl_new);
            self.state
                .covariance
                .view_mut((POSE_DIM, 0), (n - POSE_DIM, POSE_DIM))
                .copy_from(&p_pl_new.transpose());
        }

        // 4. Restore invariants.
        self.state.condition();
    }

    // --- Correction ---

    /// Processes `observations` in order against a copy of the current state.
    ///
    /// Each observation is associated with the compatible landmark of smallest
    /// squared Mahalanobis distance inside the gate (lowest index on ties), or
    /// appended as a new landmark when nothing qualifies. Later observations
    /// see the effect of earlier ones.
    pub fn stage_update(&self, observations: &[Observation]) -> StagedUpdate {
        let mut state = self.state.clone();
        let outcomes = observations
            .iter()
            .map(|obs| self.process_observation(&mut state, obs))
            .collect();
        StagedUpdate { state, outcomes }
    }

    pub fn commit(&mut self, staged: StagedUpdate) -> Vec<ObservationOutcome> {
        self.state = staged.state;
        staged.outcomes
    }

    /// `stage_update` followed by `commit`.
    pub fn update(&mut self, observations: &[Observation]) -> Vec<ObservationOutcome> {
        let staged = self.stage_update(observations);
        self.commit(staged)
    }

    fn process_observation(&self, state: &mut SlamState, obs: &Observation) -> ObservationOutcome {
        if !(obs.range.is_finite() && obs.range > 0.0 && obs.bearing.is_finite()) {
            warn!(range = obs.range, bearing = obs.bearing, "skipping invalid observation");
            return ObservationOutcome::Skipped(SkipReason::InvalidMeasurement);
        }
        let z = Vector2::new(obs.range, crate::types::normalize_angle(obs.bearing));
        let r = self.measurement.noise(&z);

        // 1. Data association.
        let association = match self.associate(state, obs, &z, &r) {
            Ok(association) => association,
            Err(reason) => {
                warn!(?reason, range = obs.range, bearing = obs.bearing, "skipping observation");
                return ObservationOutcome::Skipped(reason);
            }
        };

        let Some(association) = association else {
            // 2a. Nothing inside the gate: augment.
            let index = self.add_landmark(state, obs, &z, &r);
            debug!(landmark = index, range = obs.range, bearing = obs.bearing, "added landmark");
            return ObservationOutcome::Added { landmark: index };
        };

        // 2b. Not confirmed yet: count the sighting only.
        let record = &mut state.landmarks[association.landmark];
        if record.observations < self.config.min_observations_before_update {
            record.observations += 1;
            debug!(
                landmark = association.landmark,
                observations = record.observations,
                "re-observed unconfirmed landmark"
            );
            return ObservationOutcome::Reobserved {
                landmark: association.landmark,
                observations: record.observations,
            };
        }

        // 2c. Kalman correction.
        match self.correct(state, &association) {
            Ok(()) => {
                state.landmarks[association.landmark].observations += 1;
                debug!(
                    landmark = association.landmark,
                    distance_sq = association.distance_sq,
                    "associated observation"
                );
                ObservationOutcome::Corrected {
                    landmark: association.landmark,
                    distance_sq: association.distance_sq,
                }
            }
            Err(reason) => {
                warn!(?reason, landmark = association.landmark, "skipping landmark update");
                ObservationOutcome::Skipped(reason)
            }
        }
    }

    /// Finds the gated nearest neighbour among compatible landmarks.
    fn associate(
        &self,
        state: &SlamState,
        obs: &Observation,
        z: &Vector2<f64>,
        r: &Matrix2<f64>,
    ) -> Result<Option<Association>, SkipReason> {
        let pose = state.pose_vector();
        let p = &state.covariance;
        let p_pp = state.pose_covariance();
        let mut best: Option<Association> = None;
        let mut degenerate_in_reach = false;

        for (index, record) in state.landmarks.iter().enumerate() {
            let compatible = match (&obs.descriptor, &record.descriptor) {
                (Some(a), Some(b)) => a.is_compatible(b, self.config.descriptor_width_tolerance),
                _ => true,
            };
            if !compatible {
                continue;
            }

            let offset = landmark_offset(index);
            let (Some(landmark), Some(p_ll)) = (state.landmark_position(index), state.landmark_covariance(index))
            else {
                continue;
            };
            let (Some(z_hat), Some((h_pose, h_landmark))) = (
                self.measurement.predict_measurement(&pose, &landmark),
                self.measurement.calculate_jacobians(&pose, &landmark),
            ) else {
                // Landmark under the robot: its bearing is undefined. It can
                // only claim observations whose range alone would fall in the gate.
                degenerate_in_reach |= z[0] * z[0] < self.config.association_gate * r[(0, 0)];
                continue;
            };

            // S = H P Hᵀ + R, expanded over the only two non-zero blocks of H.
            let p_pl = p.fixed_view::<POSE_DIM, LANDMARK_DIM>(0, offset).into_owned();
            let cross = h_pose * p_pl * h_landmark.transpose();
            let s = h_pose * p_pp * h_pose.transpose()
                + cross
                + cross.transpose()
                + h_landmark * p_ll * h_landmark.transpose()
                + r;

            let Some(s_inv) = s.try_inverse() else {
                return Err(SkipReason::SingularInnovation);
            };
            let innovation = self.measurement.innovation(z, &z_hat);
            let distance_sq = (innovation.transpose() * s_inv * innovation)[(0, 0)];
            if !distance_sq.is_finite() || distance_sq >= self.config.association_gate {
                continue;
            }
            if best.as_ref().map_or(true, |b| distance_sq < b.distance_sq) {
                best = Some(Association {
                    landmark: index,
                    distance_sq,
                    innovation,
                    s,
                    h_pose,
                    h_landmark,
                });
            }
        }
        if best.is_none() && degenerate_in_reach {
            return Err(SkipReason::DegenerateGeometry);
        }
        Ok(best)
    }

    /// `K = P Hᵀ S⁻¹`, `x += K ν`, `P = (I - K H) P` on `state`.
    /// Leaves `state` untouched on failure.
    fn correct(&self, state: &mut SlamState, association: &Association) -> Result<(), SkipReason> {
        if association.s.determinant().abs() < self.config.singular_tolerance {
            return Err(SkipReason::SingularInnovation);
        }
        let s_inv = association.s.try_inverse().ok_or(SkipReason::SingularInnovation)?;

        let n = state.dim();
        let offset = landmark_offset(association.landmark);
        let mut h_jac = DMatrix::<f64>::zeros(LANDMARK_DIM, n);
        h_jac.fixed_view_mut::<LANDMARK_DIM, POSE_DIM>(0, 0).copy_from(&association.h_pose);
        h_jac
            .fixed_view_mut::<LANDMARK_DIM, LANDMARK_DIM>(0, offset)
            .copy_from(&association.h_landmark);

        let s_inv = DMatrix::from_column_slice(LANDMARK_DIM, LANDMARK_DIM, s_inv.as_slice());
        let innovation = nalgebra::DVector::from_column_slice(association.innovation.as_slice());

        let k_gain = &state.covariance * h_jac.transpose() * s_inv;
        let mean = &state.mean + &k_gain * innovation;
        let i_kh = DMatrix::<f64>::identity(n, n) - &k_gain * &h_jac;
        let covariance = i_kh * &state.covariance;

        let mut candidate = SlamState {
            mean,
            covariance,
            landmarks: std::mem::take(&mut state.landmarks),
        };
        candidate.condition();
        if !candidate.is_finite() {
            state.landmarks = candidate.landmarks;
            return Err(SkipReason::NumericalFailure);
        }
        *state = candidate;
        Ok(())
    }

    /// Appends the landmark implied by `z` and returns its index.
    fn add_landmark(&self, state: &mut SlamState, obs: &Observation, z: &Vector2<f64>, r: &Matrix2<f64>) -> usize {
        let pose = state.pose_vector();
        let position = self.measurement.initialize_landmark(&pose, z);
        let (g_pose, g_z) = self.measurement.initialization_jacobians(&pose, z);

        let p_pp = state.pose_covariance();
        let landmark_cov = g_pose * p_pp * g_pose.transpose() + g_z * r * g_z.transpose();

        let n = state.dim();
        let g_pose_dyn = DMatrix::from_column_slice(LANDMARK_DIM, POSE_DIM, g_pose.as_slice());
        let cross_cov = g_pose_dyn * state.covariance.view((0, 0), (POSE_DIM, n));

        state.augment(
            position,
            landmark_cov,
            cross_cov,
            LandmarkRecord {
                descriptor: obs.descriptor,
                observations: 1,
            },
        )
    }
}
