// atlas_core/src/models/measurement.rs

use super::MeasurementModel;
use crate::config::EkfConfig;
use crate::types::normalize_angle;
use nalgebra::{Matrix2, Matrix2x3, Vector2, Vector3};

/// Below this distance the bearing to a landmark is undefined.
const MIN_RANGE: f64 = 1e-9;

/// Range-and-bearing observation of a point landmark, `z = (range, bearing)`.
///
/// The range variance is proportional to the measured range, floored at
/// `min_range_variance`; the bearing variance is constant.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBearing {
    pub range_noise: f64,
    pub min_range_variance: f64,
    pub bearing_noise: f64,
}

impl RangeBearing {
    pub fn new(range_noise: f64, min_range_variance: f64, bearing_noise: f64) -> Self {
        Self {
            range_noise,
            min_range_variance,
            bearing_noise,
        }
    }
}

impl From<&EkfConfig> for RangeBearing {
    fn from(config: &EkfConfig) -> Self {
        Self::new(config.range_noise, config.min_range_variance, config.bearing_noise)
    }
}

impl MeasurementModel for RangeBearing {
    fn predict_measurement(&self, pose: &Vector3<f64>, landmark: &Vector2<f64>) -> Option<Vector2<f64>> {
        let dx = landmark[0] - pose[0];
        let dy = landmark[1] - pose[1];
        let range = dx.hypot(dy);
        if !(range > MIN_RANGE) {
            return None;
        }
        Some(Vector2::new(range, normalize_angle(dy.atan2(dx) - pose[2])))
    }

    fn calculate_jacobians(
        &self,
        pose: &Vector3<f64>,
        landmark: &Vector2<f64>,
    ) -> Option<(Matrix2x3<f64>, Matrix2<f64>)> {
        let dx = landmark[0] - pose[0];
        let dy = landmark[1] - pose[1];
        let q = dx * dx + dy * dy;
        let r = q.sqrt();
        if !(r > MIN_RANGE) {
            return None;
        }

        #[rustfmt::skip]
        let h_pose = Matrix2x3::new(
            -dx / r, -dy / r,  0.0,
             dy / q, -dx / q, -1.0,
        );
        #[rustfmt::skip]
        let h_landmark = Matrix2::new(
             dx / r, dy / r,
            -dy / q, dx / q,
        );
        Some((h_pose, h_landmark))
    }

    fn innovation(&self, z: &Vector2<f64>, z_hat: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(z[0] - z_hat[0], normalize_angle(z[1] - z_hat[1]))
    }

    fn noise(&self, z: &Vector2<f64>) -> Matrix2<f64> {
        let range_variance = (self.range_noise * z[0].abs()).max(self.min_range_variance);
        Matrix2::new(range_variance, 0.0, 0.0, self.bearing_noise)
    }

    fn initialize_landmark(&self, pose: &Vector3<f64>, z: &Vector2<f64>) -> Vector2<f64> {
        let angle = pose[2] + z[1];
        Vector2::new(pose[0] + z[0] * angle.cos(), pose[1] + z[0] * angle.sin())
    }

    fn initialization_jacobians(&self, pose: &Vector3<f64>, z: &Vector2<f64>) -> (Matrix2x3<f64>, Matrix2<f64>) {
        let (sin_a, cos_a) = (pose[2] + z[1]).sin_cos();
        let r = z[0];

        #[rustfmt::skip]
        let g_pose = Matrix2x3::new(
            1.0, 0.0, -r * sin_a,
            0.0, 1.0,  r * cos_a,
        );
        #[rustfmt::skip]
        let g_z = Matrix2::new(
            cos_a, -r * sin_a,
            sin_a,  r * cos_a,
        );
        (g_pose, g_z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn model() -> RangeBearing {
        RangeBearing::new(0.01, 1e-4, 1e-3)
    }

    #[test]
    fn test_predict_and_initialize_are_inverse() {
        let m = model();
        let pose = Vector3::new(1.0, -1.0, FRAC_PI_2);
        let landmark = Vector2::new(-2.0, 3.0);
        let z = m.predict_measurement(&pose, &landmark).expect("non-degenerate");
        assert_abs_diff_eq!(m.initialize_landmark(&pose, &z), landmark, epsilon = 1e-12);
    }

    #[test]
    fn test_landmark_on_sensor_is_degenerate() {
        let m = model();
        let pose = Vector3::new(2.0, 2.0, 0.3);
        let landmark = Vector2::new(2.0, 2.0);
        assert!(m.predict_measurement(&pose, &landmark).is_none());
        assert!(m.calculate_jacobians(&pose, &landmark).is_none());
    }

    #[test]
    fn test_jacobians_match_finite_differences() {
        let m = model();
        let pose = Vector3::new(0.2, 0.1, -0.3);
        let landmark = Vector2::new(2.5, 1.7);
        let (h_pose, h_landmark) = m.calculate_jacobians(&pose, &landmark).expect("non-degenerate");
        let h = 1e-6;

        for col in 0..3 {
            let mut plus = pose;
            let mut minus = pose;
            plus[col] += h;
            minus[col] -= h;
            let zp = m.predict_measurement(&plus, &landmark).expect("plus");
            let zm = m.predict_measurement(&minus, &landmark).expect("minus");
            let diff = m.innovation(&zp, &zm) / (2.0 * h);
            for row in 0..2 {
                assert_abs_diff_eq!(h_pose[(row, col)], diff[row], epsilon = 1e-6);
            }
        }

        for col in 0..2 {
            let mut plus = landmark;
            let mut minus = landmark;
            plus[col] += h;
            minus[col] -= h;
            let zp = m.predict_measurement(&pose, &plus).expect("plus");
            let zm = m.predict_measurement(&pose, &minus).expect("minus");
            let diff = m.innovation(&zp, &zm) / (2.0 * h);
            for row in 0..2 {
                assert_abs_diff_eq!(h_landmark[(row, col)], diff[row], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_range_noise_is_floored() {
        let m = model();
        let near = m.noise(&Vector2::new(0.001, 0.0));
        let far = m.noise(&Vector2::new(4.0, 0.0));
        assert_abs_diff_eq!(near[(0, 0)], 1e-4);
        assert_abs_diff_eq!(far[(0, 0)], 0.04, epsilon = 1e-12);
        assert_abs_diff_eq!(far[(1, 1)], 1e-3);
    }

    #[test]
    fn test_innovation_wraps_bearing() {
        let m = model();
        let nu = m.innovation(&Vector2::new(1.0, 3.1), &Vector2::new(1.0, -3.1));
        assert_abs_diff_eq!(nu[1], 6.2 - std::f64::consts::TAU, epsilon = 1e-12);
    }
}
