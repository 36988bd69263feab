// atlas_core/src/perception/ransac.rs

use super::FeatureDetector;
use crate::config::LineConfig;
use crate::messages::{LandmarkDescriptor, LandmarkKind, Observation, Sweep};
use crate::types::{angle_difference, normalize_angle};
use nalgebra::Vector2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A point of the sweep in the sensor frame.
#[derive(Debug, Clone, Copy)]
struct ScanPoint {
    position: Vector2<f64>,
    bearing: f64,
}

/// An infinite line in Hesse normal form: `normal · p = offset`, `|normal| = 1`.
#[derive(Debug, Clone, Copy)]
struct Line {
    normal: Vector2<f64>,
    offset: f64,
}

impl Line {
    fn distance(&self, p: &Vector2<f64>) -> f64 {
        (self.normal.dot(p) - self.offset).abs()
    }

    /// Foot of the perpendicular from the sensor origin.
    fn foot(&self) -> Vector2<f64> {
        self.normal * self.offset
    }
}

/// Total-least-squares fit: the line through the centroid along the principal
/// axis of the point scatter.
fn fit_line<'a>(points: impl Iterator<Item = &'a Vector2<f64>> + Clone) -> Option<Line> {
    let n = points.clone().count();
    if n < 2 {
        return None;
    }
    let centroid = points.clone().fold(Vector2::zeros(), |acc, p| acc + p) / n as f64;

    let (mut cxx, mut cyy, mut cxy) = (0.0, 0.0, 0.0);
    for p in points {
        let d = p - centroid;
        cxx += d.x * d.x;
        cyy += d.y * d.y;
        cxy += d.x * d.y;
    }
    if cxx + cyy < f64::EPSILON {
        return None;
    }

    let direction_angle = 0.5 * (2.0 * cxy).atan2(cxx - cyy);
    let normal = Vector2::new(-direction_angle.sin(), direction_angle.cos());
    let mut line = Line {
        normal,
        offset: normal.dot(&centroid),
    };
    if line.offset < 0.0 {
        line.normal = -line.normal;
        line.offset = -line.offset;
    }
    Some(line)
}

/// RANSAC wall extraction. Each accepted wall is reported as the foot of the
/// perpendicular from the sensor, which is stable while the robot moves along it.
#[derive(Debug, Clone)]
pub struct LineDetector {
    config: LineConfig,
}

impl LineDetector {
    pub fn new(config: LineConfig) -> Self {
        Self { config }
    }
}

impl FeatureDetector for LineDetector {
    fn detect(&self, sweep: &Sweep) -> Vec<Observation> {
        let cfg = &self.config;
        let points: Vec<ScanPoint> = (0..sweep.len())
            .filter(|&i| sweep.is_return(i))
            .map(|i| {
                let bearing = normalize_angle(sweep.bearing(i));
                let r = sweep.readings[i].distance;
                ScanPoint {
                    position: Vector2::new(r * bearing.cos(), r * bearing.sin()),
                    bearing,
                }
            })
            .collect();

        // A fresh generator per sweep keeps extraction a pure function of its input.
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let mut claimed = vec![false; points.len()];
        let mut observations = Vec::new();

        for _ in 0..cfg.max_trials {
            let unclaimed: Vec<usize> = (0..points.len()).filter(|&i| !claimed[i]).collect();
            if unclaimed.len() < cfg.consensus {
                break;
            }

            // 1. Base point plus samples from its bearing window.
            let Some(&base) = unclaimed.choose(&mut rng) else {
                break;
            };
            let window: Vec<usize> = unclaimed
                .iter()
                .copied()
                .filter(|&i| {
                    i != base && angle_difference(points[base].bearing, points[i].bearing).abs() <= cfg.sample_window
                })
                .collect();
            if window.len() + 1 < cfg.samples {
                continue;
            }
            let mut sample = vec![base];
            sample.extend(window.choose_multiple(&mut rng, cfg.samples - 1).copied());

            // 2. Fit and count supporters.
            let Some(line) = fit_line(sample.iter().map(|&i| &points[i].position)) else {
                continue;
            };
            let supporters: Vec<usize> = unclaimed
                .iter()
                .copied()
                .filter(|&i| line.distance(&points[i].position) < cfg.max_error)
                .collect();
            if supporters.len() < cfg.consensus {
                continue;
            }

            // 3. Claim the supporters and refit on all of them.
            for &i in &supporters {
                claimed[i] = true;
            }
            let Some(line) = fit_line(supporters.iter().map(|&i| &points[i].position)) else {
                continue;
            };
            let foot = line.foot();
            let range = foot.norm();
            if range < f64::EPSILON {
                continue;
            }

            let direction = Vector2::new(-line.normal.y, line.normal.x);
            let (lo, hi) = supporters
                .iter()
                .map(|&i| direction.dot(&points[i].position))
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t), hi.max(t)));

            observations.push(Observation::with_descriptor(
                range,
                foot.y.atan2(foot.x),
                LandmarkDescriptor::new(LandmarkKind::Line, Some(hi - lo)),
            ));
        }
        observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Wall at x = 2 in the sensor frame, seen from -60° to 60°.
    fn wall_sweep() -> Sweep {
        let increment = 1f64.to_radians();
        let start = -60f64.to_radians();
        let distances: Vec<f64> = (0..121).map(|i| 2.0 / (start + i as f64 * increment).cos()).collect();
        Sweep::from_distances(start, increment, 5.0, &distances)
    }

    #[test]
    fn test_fit_line_through_horizontal_points() {
        let points = [Vector2::new(0.0, 1.0), Vector2::new(1.0, 1.0), Vector2::new(2.0, 1.0)];
        let line = fit_line(points.iter()).expect("line");
        assert_abs_diff_eq!(line.offset, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(line.normal, Vector2::new(0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_wall_yields_perpendicular_foot() {
        let config = LineConfig {
            enabled: true,
            ..LineConfig::default()
        };
        let observations = LineDetector::new(config).detect(&wall_sweep());

        assert_eq!(observations.len(), 1);
        assert_abs_diff_eq!(observations[0].range, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(observations[0].bearing, 0.0, epsilon = 1e-9);
        let descriptor = observations[0].descriptor.expect("descriptor");
        assert_eq!(descriptor.kind, LandmarkKind::Line);
        assert_abs_diff_eq!(descriptor.width.expect("width"), 4.0 * 60f64.to_radians().tan(), epsilon = 1e-9);
    }

    #[test]
    fn test_same_seed_same_result() {
        let config = LineConfig {
            enabled: true,
            consensus: 10,
            ..LineConfig::default()
        };
        let detector = LineDetector::new(config);
        let sweep = wall_sweep();
        assert_eq!(detector.detect(&sweep), detector.detect(&sweep));
    }

    #[test]
    fn test_too_few_points_yield_nothing() {
        let sweep = Sweep::from_distances(0.0, 0.01, 5.0, &[2.0; 10]);
        assert!(LineDetector::new(LineConfig::default()).detect(&sweep).is_empty());
    }
}
